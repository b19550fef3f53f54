//! RFC 6455 frame header codec.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```
//!
//! The codec only knows about headers and masking. Opcodes are carried as raw numbers so that
//! unknown values reach the dispatcher instead of being rejected here.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::frame::{FrameError, MAX_CONTROL_PAYLOAD_BYTES, WsFrame};

const FIN_BIT: u8 = 0x80;
const RSV_BITS: u8 = 0x70;
const OPCODE_BITS: u8 = 0x0F;
const MASK_BIT: u8 = 0x80;
const LEN_BITS: u8 = 0x7F;

/// Minimum number of bytes any frame header occupies.
pub const MIN_HEADER_LEN: usize = 2;

/// One decoded frame with its payload already unmasked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub fin: bool,
    pub opcode: u8,
    pub payload: Bytes,
}

/// Outcome of a failed decode attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not enough bytes to read the full header. Wait for more data.
    #[error("incomplete header")]
    IncompleteHeader,
    /// Header is complete but the payload is not. Wait for more data.
    #[error("not enough payload")]
    NotEnoughPayload,
    /// The stream can never become a valid frame.
    #[error("{0}")]
    Fatal(FrameError),
}

#[derive(Clone, Copy, Debug)]
struct Header {
    fin: bool,
    opcode: u8,
    mask: Option<[u8; 4]>,
    payload_len: u64,
    header_len: usize,
}

fn decode_header(buf: &[u8]) -> Result<Header, DecodeError> {
    if buf.len() < MIN_HEADER_LEN {
        return Err(DecodeError::IncompleteHeader);
    }
    let b0 = buf[0];
    let b1 = buf[1];
    let fin = b0 & FIN_BIT != 0;
    let opcode = b0 & OPCODE_BITS;
    let masked = b1 & MASK_BIT != 0;

    // No extensions are negotiated, so every reserved bit must be clear.
    if b0 & RSV_BITS != 0 {
        return Err(DecodeError::Fatal(FrameError::InvalidHeader));
    }

    let mut offset = MIN_HEADER_LEN;
    let payload_len = match b1 & LEN_BITS {
        126 => {
            let ext = buf
                .get(offset..offset + 2)
                .ok_or(DecodeError::IncompleteHeader)?;
            offset += 2;
            u64::from(u16::from_be_bytes([ext[0], ext[1]]))
        }
        127 => {
            let ext = buf
                .get(offset..offset + 8)
                .ok_or(DecodeError::IncompleteHeader)?;
            offset += 8;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(ext);
            let len = u64::from_be_bytes(raw);
            if len >> 63 != 0 {
                return Err(DecodeError::Fatal(FrameError::InvalidHeader));
            }
            len
        }
        len => u64::from(len),
    };

    if opcode & 0x8 != 0 && (!fin || payload_len > MAX_CONTROL_PAYLOAD_BYTES as u64) {
        return Err(DecodeError::Fatal(FrameError::InvalidHeader));
    }

    let mask = if masked {
        let key = buf
            .get(offset..offset + 4)
            .ok_or(DecodeError::IncompleteHeader)?;
        offset += 4;
        Some([key[0], key[1], key[2], key[3]])
    } else {
        None
    };

    Ok(Header {
        fin,
        opcode,
        mask,
        payload_len,
        header_len: offset,
    })
}

/// Decode one frame from the front of `buf`.
///
/// On success the frame's bytes are split off `buf`; on any error `buf` is left untouched.
/// A declared payload longer than `max_payload` is fatal.
pub fn decode_frame(buf: &mut BytesMut, max_payload: usize) -> Result<RawFrame, DecodeError> {
    let header = decode_header(buf)?;
    if header.payload_len > max_payload as u64 {
        return Err(DecodeError::Fatal(FrameError::MessageTooBig));
    }
    // Bounded by `max_payload` above, so this fits in usize.
    let payload_len = header.payload_len as usize;
    let total = header.header_len + payload_len;
    if buf.len() < total {
        return Err(DecodeError::NotEnoughPayload);
    }

    let mut frame = buf.split_to(total);
    let mut payload = frame.split_off(header.header_len);
    if let Some(key) = header.mask {
        apply_mask(&mut payload, key);
    }
    Ok(RawFrame {
        fin: header.fin,
        opcode: header.opcode,
        payload: payload.freeze(),
    })
}

/// XOR the payload against the masking key, cycling the key byte by byte.
#[inline]
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}

/// Encode a single final frame. `mask` must be `Some` for client-originated frames.
pub fn encode_frame(frame: &WsFrame, mask: Option<[u8; 4]>) -> Bytes {
    encode_raw(true, frame.kind().opcode(), &frame.payload(), mask)
}

/// Encode a client frame with a fresh random masking key.
#[inline]
pub fn encode_client_frame(frame: &WsFrame) -> Bytes {
    encode_frame(frame, Some(rand::random::<[u8; 4]>()))
}

/// Encode a frame from its raw parts. Also used to build server-side frames in tests.
pub fn encode_raw(fin: bool, opcode: u8, payload: &[u8], mask: Option<[u8; 4]>) -> Bytes {
    let len = payload.len();
    let mut buf = BytesMut::with_capacity(14 + len);
    let fin_bit = if fin { FIN_BIT } else { 0 };
    buf.put_u8(fin_bit | (opcode & OPCODE_BITS));

    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };
    if len < 126 {
        buf.put_u8(mask_bit | len as u8);
    } else if len <= u16::MAX as usize {
        buf.put_u8(mask_bit | 126);
        buf.put_u16(len as u16);
    } else {
        buf.put_u8(mask_bit | 127);
        buf.put_u64(len as u64);
    }

    match mask {
        Some(key) => {
            buf.put_slice(&key);
            let start = buf.len();
            buf.put_slice(payload);
            apply_mask(&mut buf[start..], key);
        }
        None => buf.put_slice(payload),
    }
    buf.freeze()
}
