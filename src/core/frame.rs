use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;
pub const CLOSE_MESSAGE_TOO_BIG: u16 = 1009;

/// Control frames (close, ping, pong) carry at most this many payload bytes.
pub const MAX_CONTROL_PAYLOAD_BYTES: usize = 125;
/// Close reason budget: the control payload minus the two-byte status code.
pub const MAX_CLOSE_REASON_BYTES: usize = MAX_CONTROL_PAYLOAD_BYTES - 2;

/// Logical websocket frame, after payload parsing and fragment assembly.
///
/// This is the public "wire" surface for the library: the codec produces and consumes raw
/// payloads, and [`FrameKind`] maps them into/from `WsFrame`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WsFrame {
    Continuation(Bytes),
    Text(Bytes),
    Binary(Bytes),
    Close(Option<WsCloseFrame>),
    Ping(Bytes),
    Pong(Bytes),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WsCloseFrame {
    pub code: u16,
    pub reason: Bytes,
}

/// Frame-stream failures. Every variant is fatal for the connection; the `Display` text is the
/// reason carried in the close frame sent to the peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Invalid header")]
    InvalidHeader,
    #[error("Unknown opcode")]
    UnknownOpcode(u8),
    #[error("Got continuation frame without prior frame")]
    ContinuationWithoutPrior,
    #[error("Got new frame before old incomplete frame was completed")]
    UnfinishedFragment,
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,
    #[error("Invalid close frame payload")]
    InvalidClosePayload,
    #[error("Message too big")]
    MessageTooBig,
}

impl FrameError {
    /// Status code sent in the close frame for this failure.
    pub fn close_code(&self) -> u16 {
        match self {
            FrameError::MessageTooBig => CLOSE_MESSAGE_TOO_BIG,
            _ => CLOSE_PROTOCOL_ERROR,
        }
    }
}

/// Closed set of frame types known to the engine, indexed by opcode.
///
/// This is the frame-type registry: it is `const`, so it is built once and shared freely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl FrameKind {
    pub const ALL: [FrameKind; 6] = [
        FrameKind::Continuation,
        FrameKind::Text,
        FrameKind::Binary,
        FrameKind::Close,
        FrameKind::Ping,
        FrameKind::Pong,
    ];

    /// Look up the frame type for a wire opcode. `None` means the opcode is unknown.
    #[inline]
    pub const fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            0x0 => Some(FrameKind::Continuation),
            0x1 => Some(FrameKind::Text),
            0x2 => Some(FrameKind::Binary),
            0x8 => Some(FrameKind::Close),
            0x9 => Some(FrameKind::Ping),
            0xA => Some(FrameKind::Pong),
            _ => None,
        }
    }

    #[inline]
    pub const fn opcode(self) -> u8 {
        match self {
            FrameKind::Continuation => 0x0,
            FrameKind::Text => 0x1,
            FrameKind::Binary => 0x2,
            FrameKind::Close => 0x8,
            FrameKind::Ping => 0x9,
            FrameKind::Pong => 0xA,
        }
    }

    /// Ping, pong and close. Control frames are never fragmented.
    #[inline]
    pub const fn is_control(self) -> bool {
        matches!(self, FrameKind::Close | FrameKind::Ping | FrameKind::Pong)
    }

    /// Build the logical frame for an unmasked payload of this type.
    pub fn parse(self, payload: Bytes) -> Result<WsFrame, FrameError> {
        Ok(match self {
            FrameKind::Continuation => WsFrame::Continuation(payload),
            FrameKind::Text => WsFrame::Text(payload),
            FrameKind::Binary => WsFrame::Binary(payload),
            FrameKind::Ping => WsFrame::Ping(payload),
            FrameKind::Pong => WsFrame::Pong(payload),
            FrameKind::Close => WsFrame::Close(parse_close_payload(payload)?),
        })
    }
}

fn parse_close_payload(payload: Bytes) -> Result<Option<WsCloseFrame>, FrameError> {
    match payload.len() {
        0 => Ok(None),
        1 => Err(FrameError::InvalidClosePayload),
        _ => {
            let code = u16::from_be_bytes([payload[0], payload[1]]);
            Ok(Some(WsCloseFrame {
                code,
                reason: payload.slice(2..),
            }))
        }
    }
}

impl WsFrame {
    #[inline]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(Bytes::from(s.into()))
    }

    #[inline]
    pub fn binary(b: impl Into<Bytes>) -> Self {
        Self::Binary(b.into())
    }

    #[inline]
    pub fn close(code: u16, reason: impl Into<Bytes>) -> Self {
        Self::Close(Some(WsCloseFrame {
            code,
            reason: reason.into(),
        }))
    }

    /// Close frame sent by a caller-initiated close.
    #[inline]
    pub fn default_close() -> Self {
        Self::close(CLOSE_NORMAL, Bytes::new())
    }

    /// Shorten an oversized close reason so the frame fits a control payload. UTF-8 reasons
    /// are cut on a char boundary.
    pub fn clamp_close_reason(self) -> Self {
        match self {
            WsFrame::Close(Some(mut close)) if close.reason.len() > MAX_CLOSE_REASON_BYTES => {
                let end = match std::str::from_utf8(&close.reason) {
                    Ok(text) => (0..=MAX_CLOSE_REASON_BYTES)
                        .rev()
                        .find(|&end| text.is_char_boundary(end))
                        .unwrap_or(0),
                    Err(_) => MAX_CLOSE_REASON_BYTES,
                };
                close.reason.truncate(end);
                WsFrame::Close(Some(close))
            }
            other => other,
        }
    }

    #[inline]
    pub fn kind(&self) -> FrameKind {
        match self {
            WsFrame::Continuation(_) => FrameKind::Continuation,
            WsFrame::Text(_) => FrameKind::Text,
            WsFrame::Binary(_) => FrameKind::Binary,
            WsFrame::Close(_) => FrameKind::Close,
            WsFrame::Ping(_) => FrameKind::Ping,
            WsFrame::Pong(_) => FrameKind::Pong,
        }
    }

    #[inline]
    pub fn is_close(&self) -> bool {
        matches!(self, WsFrame::Close(_))
    }

    /// Payload length without building the wire payload.
    pub fn payload_len(&self) -> usize {
        match self {
            WsFrame::Continuation(b)
            | WsFrame::Text(b)
            | WsFrame::Binary(b)
            | WsFrame::Ping(b)
            | WsFrame::Pong(b) => b.len(),
            WsFrame::Close(None) => 0,
            WsFrame::Close(Some(close)) => 2 + close.reason.len(),
        }
    }

    /// Wire payload (unmasked) for this frame.
    pub fn payload(&self) -> Bytes {
        match self {
            WsFrame::Continuation(b)
            | WsFrame::Text(b)
            | WsFrame::Binary(b)
            | WsFrame::Ping(b)
            | WsFrame::Pong(b) => b.clone(),
            WsFrame::Close(None) => Bytes::new(),
            WsFrame::Close(Some(close)) => {
                let mut buf = BytesMut::with_capacity(2 + close.reason.len());
                buf.put_u16(close.code);
                buf.put_slice(&close.reason);
                buf.freeze()
            }
        }
    }

    /// Append a continuation's payload to this (first-fragment) frame.
    ///
    /// Only text and binary frames start fragmented messages; for any other frame the
    /// continuation is dropped and the frame is returned unchanged.
    pub fn merge(self, continuation: &WsFrame) -> WsFrame {
        let WsFrame::Continuation(tail) = continuation else {
            return self;
        };
        match self {
            WsFrame::Text(head) => WsFrame::Text(concat(head, tail)),
            WsFrame::Binary(head) => WsFrame::Binary(concat(head, tail)),
            other => other,
        }
    }

    /// Per-type payload validation. Only text frames carry a contract (UTF-8).
    pub fn validate(&self) -> Result<(), FrameError> {
        match self {
            WsFrame::Text(bytes) => std::str::from_utf8(bytes)
                .map(|_| ())
                .map_err(|_| FrameError::InvalidUtf8),
            _ => Ok(()),
        }
    }
}

fn concat(head: Bytes, tail: &Bytes) -> Bytes {
    if head.is_empty() {
        return tail.clone();
    }
    let mut buf = BytesMut::with_capacity(head.len() + tail.len());
    buf.extend_from_slice(&head);
    buf.extend_from_slice(tail);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_maps_every_known_opcode_back_to_itself() {
        for kind in FrameKind::ALL {
            assert_eq!(FrameKind::from_opcode(kind.opcode()), Some(kind));
        }
        for opcode in [0x3, 0x7, 0xB, 0xF] {
            assert_eq!(FrameKind::from_opcode(opcode), None);
        }
    }

    #[test]
    fn close_payload_parses_code_and_reason() {
        let frame = FrameKind::Close
            .parse(Bytes::from_static(b"\x03\xeaProtocol"))
            .unwrap();
        assert_eq!(frame, WsFrame::close(1002, Bytes::from_static(b"Protocol")));
        assert_eq!(frame.payload(), Bytes::from_static(b"\x03\xeaProtocol"));

        assert_eq!(FrameKind::Close.parse(Bytes::new()), Ok(WsFrame::Close(None)));
        assert_eq!(
            FrameKind::Close.parse(Bytes::from_static(b"\x03")),
            Err(FrameError::InvalidClosePayload)
        );
    }

    #[test]
    fn merge_concatenates_in_order() {
        let merged = WsFrame::text("hel")
            .merge(&WsFrame::Continuation(Bytes::from_static(b"lo")))
            .merge(&WsFrame::Continuation(Bytes::from_static(b"!")));
        assert_eq!(merged, WsFrame::text("hello!"));
    }

    #[test]
    fn text_validation_rejects_invalid_utf8() {
        assert!(WsFrame::text("ok").validate().is_ok());
        let bad = WsFrame::Text(Bytes::from_static(&[0xC3, 0x28]));
        assert_eq!(bad.validate(), Err(FrameError::InvalidUtf8));
        assert!(WsFrame::Binary(Bytes::from_static(&[0xC3, 0x28])).validate().is_ok());
    }

    #[test]
    fn oversized_close_reason_is_cut_on_a_char_boundary() {
        let frame = WsFrame::close(CLOSE_NORMAL, "é".repeat(100)).clamp_close_reason();
        assert_eq!(frame.payload_len(), 2 + 122);
        let WsFrame::Close(Some(close)) = &frame else {
            panic!("expected close frame, got {frame:?}");
        };
        assert_eq!(std::str::from_utf8(&close.reason).unwrap(), "é".repeat(61));

        let binary = WsFrame::close(CLOSE_NORMAL, vec![0xFFu8; 200]).clamp_close_reason();
        assert_eq!(binary.payload_len(), MAX_CONTROL_PAYLOAD_BYTES);

        let short = WsFrame::close(CLOSE_NORMAL, "bye");
        assert_eq!(short.clone().clamp_close_reason(), short);
    }

    #[test]
    fn message_too_big_uses_its_own_close_code() {
        assert_eq!(FrameError::MessageTooBig.close_code(), 1009);
        assert_eq!(FrameError::UnknownOpcode(3).close_code(), 1002);
        assert_eq!(FrameError::UnknownOpcode(3).to_string(), "Unknown opcode");
    }
}
