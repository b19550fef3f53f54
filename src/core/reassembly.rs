use bytes::BytesMut;

use super::codec::{DecodeError, MIN_HEADER_LEN, RawFrame, decode_frame};
use super::frame::FrameError;

/// Accumulates transport reads until they hold whole frames.
///
/// Transport segmentation is arbitrary: a read may end mid-header, mid-payload, or carry several
/// frames at once. Callers push every chunk and then drain with [`ReceiveBuffer::next_frame`]
/// until it yields `Ok(None)`.
#[derive(Debug)]
pub struct ReceiveBuffer {
    buf: BytesMut,
    max_frame_bytes: usize,
}

impl ReceiveBuffer {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_bytes,
        }
    }

    /// Append a transport chunk behind whatever is already buffered.
    #[inline]
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Take the next complete frame off the front of the buffer.
    ///
    /// `Ok(None)` means more bytes are needed; everything buffered is kept. Fewer than two
    /// buffered bytes never reach the decoder.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>, FrameError> {
        if self.buf.len() < MIN_HEADER_LEN {
            return Ok(None);
        }
        match decode_frame(&mut self.buf, self.max_frame_bytes) {
            Ok(frame) => Ok(Some(frame)),
            Err(DecodeError::IncompleteHeader | DecodeError::NotEnoughPayload) => Ok(None),
            Err(DecodeError::Fatal(err)) => Err(err),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
