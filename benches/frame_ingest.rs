use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use ws_engine::core::codec::encode_raw;
use ws_engine::ws::{FragmentAssembler, ReceiveBuffer, resolve_frame};

const MAX: usize = 16 * 1024 * 1024;

fn text_stream(frames: usize, payload_len: usize) -> Vec<u8> {
    let payload = vec![b'{'; payload_len];
    let mut wire = Vec::with_capacity(frames * (payload_len + 4));
    for _ in 0..frames {
        wire.extend_from_slice(&encode_raw(true, 0x1, &payload, None));
    }
    wire
}

fn fragmented_stream(messages: usize, fragments: usize, fragment_len: usize) -> Vec<u8> {
    let piece = vec![0xABu8; fragment_len];
    let mut wire = Vec::new();
    for _ in 0..messages {
        for i in 0..fragments {
            let opcode = if i == 0 { 0x2 } else { 0x0 };
            wire.extend_from_slice(&encode_raw(i + 1 == fragments, opcode, &piece, None));
        }
    }
    wire
}

/// Push `wire` in `chunk`-sized reads and drain after each, as the actor does.
fn drain(wire: &[u8], chunk: usize) -> usize {
    let mut receive = ReceiveBuffer::new(MAX);
    let mut fragments = FragmentAssembler::new(MAX);
    let mut delivered = 0;
    for read in wire.chunks(chunk) {
        receive.extend(read);
        while let Ok(Some(raw)) = receive.next_frame() {
            if let Ok(Some(frame)) = resolve_frame(raw, &mut fragments) {
                black_box(&frame);
                delivered += 1;
            }
        }
    }
    delivered
}

fn bench_text_frame_ingest(c: &mut Criterion) {
    let wire = text_stream(1000, 512);

    c.bench_function("ingest_1000_text_frames_single_read", |b| {
        b.iter(|| black_box(drain(black_box(&wire), wire.len())))
    });

    // Typical socket read size; frames straddle read boundaries.
    c.bench_function("ingest_1000_text_frames_4k_reads", |b| {
        b.iter(|| black_box(drain(black_box(&wire), 4096)))
    });

    c.bench_function("ingest_1000_text_frames_61b_reads", |b| {
        b.iter(|| black_box(drain(black_box(&wire), 61)))
    });
}

fn bench_fragment_assembly(c: &mut Criterion) {
    let wire = fragmented_stream(100, 8, 1024);

    c.bench_function("assemble_100_messages_of_8_fragments", |b| {
        b.iter(|| black_box(drain(black_box(&wire), 4096)))
    });
}

criterion_group!(benches, bench_text_frame_ingest, bench_fragment_assembly);
criterion_main!(benches);
