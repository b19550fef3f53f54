use bytes::Bytes;
use proptest::prelude::*;
use ws_engine::core::codec::encode_raw;
use ws_engine::ws::{FragmentAssembler, FrameError, ReceiveBuffer, WsFrame, resolve_frame};

const OP_CONTINUATION: u8 = 0x0;
const OP_TEXT: u8 = 0x1;
const OP_BINARY: u8 = 0x2;
const OP_PING: u8 = 0x9;

/// Cut `payload` at the given offsets and encode the pieces as server fragments, with a ping after
/// the first piece when `ping` is set.
fn fragmented_wire(opcode: u8, payload: &[u8], cuts: &[usize], ping: bool) -> Vec<u8> {
    let mut bounds: Vec<usize> = cuts.iter().map(|c| c % (payload.len() + 1)).collect();
    bounds.sort_unstable();
    bounds.dedup();
    bounds.retain(|&b| b != 0 && b != payload.len());

    let mut pieces = Vec::new();
    let mut start = 0;
    for end in bounds.into_iter().chain(std::iter::once(payload.len())) {
        pieces.push(&payload[start..end]);
        start = end;
    }

    let mut wire = Vec::new();
    let last = pieces.len() - 1;
    for (i, piece) in pieces.iter().enumerate() {
        let op = if i == 0 { opcode } else { OP_CONTINUATION };
        wire.extend_from_slice(&encode_raw(i == last, op, piece, None));
        if ping && i == 0 {
            wire.extend_from_slice(&encode_raw(true, OP_PING, b"p", None));
        }
    }
    wire
}

/// Feed `wire` through the receive path in chunks of the given sizes.
fn ingest(wire: &[u8], chunk_sizes: &[usize]) -> Result<Vec<WsFrame>, FrameError> {
    let mut receive = ReceiveBuffer::new(1 << 20);
    let mut fragments = FragmentAssembler::new(1 << 20);
    let mut delivered = Vec::new();

    let mut offset = 0;
    let mut sizes = chunk_sizes.iter().cycle();
    while offset < wire.len() {
        let size = sizes.next().copied().unwrap_or(1).max(1);
        let end = (offset + size).min(wire.len());
        receive.extend(&wire[offset..end]);
        offset = end;
        while let Some(raw) = receive.next_frame()? {
            if let Some(frame) = resolve_frame(raw, &mut fragments)? {
                delivered.push(frame);
            }
        }
    }
    assert!(receive.is_empty());
    assert!(!fragments.is_pending());
    Ok(delivered)
}

proptest! {
    #[test]
    fn fragmented_binary_is_delivered_once_in_any_segmentation(
        payload in proptest::collection::vec(any::<u8>(), 0..600),
        cuts in proptest::collection::vec(any::<usize>(), 0..6),
        chunks in proptest::collection::vec(1usize..40, 1..8),
        ping in any::<bool>(),
    ) {
        let wire = fragmented_wire(OP_BINARY, &payload, &cuts, ping);
        let delivered = ingest(&wire, &chunks).unwrap();

        let data: Vec<_> = delivered.iter().filter(|f| !matches!(f, WsFrame::Ping(_))).collect();
        prop_assert_eq!(data.len(), 1);
        prop_assert_eq!(data[0], &WsFrame::Binary(Bytes::from(payload)));
        prop_assert_eq!(delivered.len(), 1 + usize::from(ping));
    }

    #[test]
    fn fragmented_text_reassembles_split_code_points(
        text in "\\PC{0,80}",
        cuts in proptest::collection::vec(any::<usize>(), 0..6),
        chunks in proptest::collection::vec(1usize..16, 1..8),
    ) {
        let wire = fragmented_wire(OP_TEXT, text.as_bytes(), &cuts, false);
        let delivered = ingest(&wire, &chunks).unwrap();
        prop_assert_eq!(delivered, vec![WsFrame::text(text)]);
    }

    #[test]
    fn short_chunks_are_never_decoded(first in any::<u8>()) {
        let mut receive = ReceiveBuffer::new(1024);
        receive.extend(&[first]);
        prop_assert_eq!(receive.next_frame(), Ok(None));
        prop_assert_eq!(receive.len(), 1);
    }
}
