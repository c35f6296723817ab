//! Round-trip and end-to-end tests against an independent deflate encoder.

use unflate::inflate::{decompress_to_vec, Inflater, LimitSink};
use unflate::InflateError;

/// Repetitive but non-trivial data, long enough to span several window
/// flushes and to make the encoder emit matches that cross them.
fn patterned_data(len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    let mut chunk = 0usize;
    while data.len() < len {
        let line = format!("chunk {:06}: the quick brown fox jumps over the lazy dog\n", chunk);
        data.extend_from_slice(line.as_bytes());
        // Re-emit an earlier stretch now and then to create long-range
        // back-references.
        if chunk % 7 == 0 && data.len() > 40 * 1024 {
            let start = data.len() - 40 * 1024;
            let repeat: Vec<u8> = data[start..start + 1024].to_vec();
            data.extend_from_slice(&repeat);
        }
        chunk += 1;
    }
    data.truncate(len);
    data
}

fn roundtrip(data: &[u8], level: u8) {
    let compressed = miniz_oxide::deflate::compress_to_vec(data, level);
    let mut out = Vec::new();
    let summary = Inflater::new()
        .inflate(&compressed, &mut out)
        .unwrap_or_else(|e| panic!("level {}: {}", level, e));
    assert_eq!(out, data, "level {}", level);
    assert_eq!(summary.bytes_out, data.len() as u64);
    assert_eq!(summary.crc32, crc32fast::hash(data));
}

#[test]
fn roundtrip_short_text() {
    for level in [1, 6, 9] {
        roundtrip(b"Hello, hello, hello world!", level);
    }
}

#[test]
fn roundtrip_empty() {
    roundtrip(b"", 6);
}

#[test]
fn roundtrip_stored_blocks() {
    // Level 0 emits stored blocks only.
    roundtrip(&patterned_data(100_000), 0);
}

#[test]
fn roundtrip_across_window_flushes() {
    let data = patterned_data(200_000);
    for level in [1, 6, 10] {
        roundtrip(&data, level);
    }
}

#[test]
fn roundtrip_incompressible() {
    // A fixed-seed xorshift stream; no matches for the encoder to find.
    let mut state = 0x2545f491_4f6cdd1du64;
    let data: Vec<u8> = (0..60_000)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect();
    roundtrip(&data, 6);
}

#[test]
fn larger_window_changes_nothing() {
    let data = patterned_data(150_000);
    let compressed = miniz_oxide::deflate::compress_to_vec(&data, 6);

    let mut small = Vec::new();
    let with_small = Inflater::new().inflate(&compressed, &mut small).unwrap();
    let mut large = Vec::new();
    let with_large = Inflater::new()
        .with_window_size(128 * 1024)
        .inflate(&compressed, &mut large)
        .unwrap();

    assert_eq!(small, large);
    assert_eq!(with_small, with_large);
}

#[test]
fn decoding_is_deterministic() {
    let data = patterned_data(80_000);
    let compressed = miniz_oxide::deflate::compress_to_vec(&data, 9);

    let mut first = Vec::new();
    let a = Inflater::new().inflate(&compressed, &mut first).unwrap();
    let mut second = Vec::new();
    let b = Inflater::new().inflate(&compressed, &mut second).unwrap();

    assert_eq!(first, second);
    assert_eq!(a, b);
}

#[test]
fn limit_sink_bounds_output() {
    let data = patterned_data(100_000);
    let compressed = miniz_oxide::deflate::compress_to_vec(&data, 6);

    // Exact fit succeeds.
    let mut buf = vec![0u8; data.len()];
    let mut sink = LimitSink::new(&mut buf);
    Inflater::new().inflate(&compressed, &mut sink).unwrap();
    assert_eq!(sink.written(), data.len());
    assert_eq!(buf, data);

    // A buffer one window short aborts mid-stream.
    let mut short = vec![0u8; data.len() - 32 * 1024];
    let mut sink = LimitSink::new(&mut short);
    let err = Inflater::new().inflate(&compressed, &mut sink).unwrap_err();
    assert!(matches!(err, InflateError::Sink(_)));
}

#[test]
fn truncated_streams_fail() {
    let data = patterned_data(50_000);
    let compressed = miniz_oxide::deflate::compress_to_vec(&data, 6);
    for cut in [1, compressed.len() / 2, compressed.len() - 1] {
        assert!(decompress_to_vec(&compressed[..cut]).is_err(), "cut at {}", cut);
    }
}

#[test]
fn trailing_garbage_is_ignored() {
    // The stream defines its own end; bytes after the final block do not
    // take part in decoding.
    let mut compressed = miniz_oxide::deflate::compress_to_vec(b"payload", 6);
    compressed.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(decompress_to_vec(&compressed).unwrap(), b"payload");
}
