use super::frame::{FrameError, FrameKind, WsFrame};

/// Reassembles fragmented data messages.
///
/// At most one message is mid-assembly. Control frames pass straight through and may
/// interleave with the fragments of a data message.
#[derive(Debug)]
pub struct FragmentAssembler {
    pending: Option<WsFrame>,
    max_message_bytes: usize,
}

impl FragmentAssembler {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            pending: None,
            max_message_bytes,
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Resolve a freshly parsed frame against the pending fragment.
    ///
    /// Returns the frame to deliver, `None` while a message is still incomplete, or the protocol
    /// violation. On error the pending fragment is discarded.
    pub fn resolve(&mut self, frame: WsFrame, fin: bool) -> Result<Option<WsFrame>, FrameError> {
        let kind = frame.kind();
        match (kind, self.pending.take()) {
            (FrameKind::Continuation, None) => Err(FrameError::ContinuationWithoutPrior),
            (FrameKind::Continuation, Some(pending)) => {
                let merged_len = pending.payload_len() + frame.payload_len();
                if merged_len > self.max_message_bytes {
                    return Err(FrameError::MessageTooBig);
                }
                let merged = pending.merge(&frame);
                if fin {
                    Ok(Some(merged))
                } else {
                    self.pending = Some(merged);
                    Ok(None)
                }
            }
            (kind, None) if !kind.is_control() && !fin => {
                self.pending = Some(frame);
                Ok(None)
            }
            (kind, Some(_)) if !kind.is_control() => Err(FrameError::UnfinishedFragment),
            (_, pending) => {
                self.pending = pending;
                Ok(Some(frame))
            }
        }
    }
}
