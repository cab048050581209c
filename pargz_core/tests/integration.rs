//! End-to-end behaviour of `ParallelWriter`: ordering, completeness, and the
//! flush/close lifecycle.
mod common;

use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pargz_codecs::{GzipCodec, Lz4Codec, PassThroughCodec, ZstdCodec};
use pargz_core::{Codec, ParallelWriter, StreamConfig, StreamError, StreamState};

use common::{compressible_bytes, pseudo_random_bytes, GatedCodec, JitterCodec, SharedSink, TrackedSink};

fn config(block_size: usize, workers: usize, queue: usize) -> StreamConfig {
    StreamConfig::default()
        .with_block_size(block_size)
        .with_workers(workers)
        .with_queue_capacity(queue)
}

/// Write `data` in `chunk`-sized pieces and return the finished sink.
fn compress_in_chunks(
    codec: Arc<dyn Codec>,
    config: StreamConfig,
    data: &[u8],
    chunk: usize,
) -> Vec<u8> {
    let mut w = ParallelWriter::new(Vec::new(), codec, config).unwrap();
    for piece in data.chunks(chunk) {
        w.write(piece).unwrap();
    }
    w.finish().unwrap()
}

#[test]
fn test_order_preserved_under_jittered_compression() {
    let data = pseudo_random_bytes(200 * 1024, 0xDEAD_BEEF);
    let codec: Arc<dyn Codec> = Arc::new(JitterCodec::new(15));

    let out = compress_in_chunks(Arc::clone(&codec), config(4096, 8, 4), &data, 1000);

    assert_eq!(codec.decompress_stream(&out).unwrap(), data);
}

#[test]
fn test_roundtrip_every_bundled_codec() {
    let data = compressible_bytes(10 * 16 * 1024 + 333);
    let codecs: Vec<Arc<dyn Codec>> = vec![
        Arc::new(GzipCodec::default()),
        Arc::new(ZstdCodec::default()),
        Arc::new(Lz4Codec),
        Arc::new(PassThroughCodec),
    ];

    for codec in codecs {
        let out = compress_in_chunks(Arc::clone(&codec), config(16 * 1024, 4, 2), &data, 7000);
        let decoded = codec.decompress_stream(&out).unwrap();
        assert_eq!(decoded, data, "codec {}", codec.name());
    }
}

#[test]
fn test_blocks_are_sealed_per_threshold_without_splitting_writes() {
    let mut w = ParallelWriter::new(Vec::new(), Arc::new(PassThroughCodec), config(10, 2, 2)).unwrap();

    w.write(b"0123").unwrap(); // pending 4
    w.write(b"456789ab").unwrap(); // pending 12 -> sealed as one 12-byte block
    w.write(&[b'x'; 25]).unwrap(); // one 25-byte block
    w.write(b"tail").unwrap(); // partial, sealed by flush
    assert_eq!(w.stats().blocks_sealed, 2);

    w.flush().unwrap();
    let stats = w.stats();
    assert_eq!(stats.blocks_sealed, 3);
    assert_eq!(stats.blocks_appended, 3);
    assert_eq!(stats.bytes_in, 4 + 8 + 25 + 4);

    let out = w.finish().unwrap();
    let mut expected = b"0123456789ab".to_vec();
    expected.extend_from_slice(&[b'x'; 25]);
    expected.extend_from_slice(b"tail");
    assert_eq!(out, expected);
}

#[test]
fn test_flush_then_close_keeps_every_byte() {
    let data = compressible_bytes(300_000);
    let sink = SharedSink::default();
    let codec: Arc<dyn Codec> = Arc::new(GzipCodec::default());

    let mut w = ParallelWriter::new(sink.clone(), Arc::clone(&codec), config(32 * 1024, 3, 3)).unwrap();
    for piece in data.chunks(10_000) {
        w.write(piece).unwrap();
    }
    w.flush().unwrap();
    assert_eq!(w.state(), StreamState::Flushing);
    assert_eq!(w.stats().blocks_appended, w.stats().blocks_sealed);
    w.close().unwrap();
    assert_eq!(w.state(), StreamState::Closed);

    // A second close is a no-op.
    w.close().unwrap();

    assert_eq!(codec.decompress_stream(&sink.contents()).unwrap(), data);
}

#[test]
fn test_empty_stream_flush_and_close() {
    let sink = SharedSink::default();
    let codec: Arc<dyn Codec> = Arc::new(GzipCodec::default());

    let mut w = ParallelWriter::new(sink.clone(), Arc::clone(&codec), config(1024, 2, 2)).unwrap();
    w.flush().unwrap();
    w.close().unwrap();

    assert_eq!(w.stats().blocks_sealed, 0);
    assert!(sink.contents().is_empty());
    assert!(codec.decompress_stream(&sink.contents()).unwrap().is_empty());
}

/// `close()` is an abort, not a flush: the partial block never reaches the sink.
#[test]
fn test_close_without_flush_discards_partial_block() {
    let sink = SharedSink::default();
    let mut w = ParallelWriter::new(sink.clone(), Arc::new(PassThroughCodec), config(1024, 2, 2)).unwrap();

    w.write(b"never sealed").unwrap();
    w.close().unwrap();

    assert!(sink.contents().is_empty());
    assert_eq!(w.stats().bytes_in, 12);
    assert_eq!(w.stats().blocks_sealed, 0);
}

/// Blocks still queued or waiting their turn when `close()` runs are dropped,
/// not drained.
#[test]
fn test_close_without_flush_drops_queued_blocks() {
    let (entered_tx, entered_rx) = crossbeam::channel::unbounded();
    let (release_tx, release_rx) = crossbeam::channel::unbounded::<()>();
    let codec = GatedCodec {
        entered: entered_tx,
        release: release_rx,
    };
    let sink = SharedSink::default();
    let config = config(1, 2, 8);
    let blocks = config.max_outstanding();

    let mut w = ParallelWriter::new(sink.clone(), Arc::new(codec), config).unwrap();
    for i in 0..blocks {
        w.write(&[i as u8]).unwrap();
    }
    assert_eq!(w.stats().blocks_sealed, blocks as u64);

    // Both workers are parked inside the codec; the rest sit in the queue.
    for _ in 0..2 {
        entered_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    }

    // Let the parked blocks finish compressing only once close() is underway.
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        drop(release_tx);
    });
    w.close().unwrap();
    releaser.join().unwrap();
    assert_eq!(w.state(), StreamState::Closed);

    let out = sink.contents();
    let all: Vec<u8> = (0..blocks as u8).collect();
    assert!(all.starts_with(&out), "sink is not an in-order prefix: {out:?}");
    assert!(out.len() < blocks, "close drained every queued block");

    let stats = w.stats();
    assert!(stats.blocks_appended < stats.blocks_sealed);
    assert_eq!(stats.blocks_appended, out.len() as u64);
}

/// `close()` flushes the sink but leaves it open; dropping the writer (or
/// `finish`) is what releases it.
#[test]
fn test_close_flushes_sink_and_drop_releases_it() {
    let sink = TrackedSink::default();
    let flushes = Arc::clone(&sink.flushes);
    let dropped = Arc::clone(&sink.dropped);

    let mut w = ParallelWriter::new(sink, Arc::new(PassThroughCodec), config(4, 1, 1)).unwrap();
    w.write(b"abcd").unwrap();
    w.close().unwrap();

    assert_eq!(flushes.load(Ordering::SeqCst), 1);
    assert!(!dropped.load(Ordering::SeqCst));

    drop(w);
    assert!(dropped.load(Ordering::SeqCst));
}

/// Discarded input shows up in `bytes_in` but not in the ratio.
#[test]
fn test_ratio_ignores_input_discarded_by_close() {
    let mut w = ParallelWriter::new(Vec::new(), Arc::new(PassThroughCodec), config(4, 1, 1)).unwrap();
    w.write(b"abcd").unwrap(); // sealed
    w.write(b"xy").unwrap(); // pending

    let deadline = Instant::now() + Duration::from_secs(10);
    while w.stats().blocks_appended < 1 {
        assert!(Instant::now() < deadline, "block 0 was never appended");
        thread::sleep(Duration::from_millis(2));
    }
    w.close().unwrap();

    let stats = w.stats();
    assert_eq!(stats.bytes_in, 6);
    assert_eq!(stats.bytes_committed, 4);
    assert_eq!(stats.bytes_out, 4);
    assert_eq!(stats.ratio(), 1.0);
}

#[test]
fn test_write_after_flush_is_rejected() {
    let mut w = ParallelWriter::new(Vec::new(), Arc::new(PassThroughCodec), config(4, 1, 1)).unwrap();
    w.write(b"abc").unwrap();
    w.flush().unwrap();

    // Flushing again is harmless.
    w.flush().unwrap();

    let err = w.write(b"late").unwrap_err();
    assert!(
        matches!(err, StreamError::InvalidState { state: StreamState::Flushing, op: "write" }),
        "unexpected error: {err}"
    );

    w.close().unwrap();
    let err = w.write(b"later").unwrap_err();
    assert!(matches!(err, StreamError::InvalidState { state: StreamState::Closed, .. }));
}

#[test]
fn test_io_write_adapter() {
    let data = compressible_bytes(100_000);
    let sink = SharedSink::default();
    let codec: Arc<dyn Codec> = Arc::new(ZstdCodec::default());

    let mut w = ParallelWriter::new(sink.clone(), Arc::clone(&codec), config(8 * 1024, 4, 4)).unwrap();
    std::io::copy(&mut &data[..], &mut w).unwrap();
    Write::flush(&mut w).unwrap();
    w.close().unwrap();

    assert_eq!(codec.decompress_stream(&sink.contents()).unwrap(), data);
}

#[test]
fn test_gzip_output_is_a_multi_member_file() {
    use std::io::Read;

    let data = compressible_bytes(5 * 4096);
    let out = compress_in_chunks(Arc::new(GzipCodec::default()), config(4096, 2, 2), &data, 4096);

    // A plain single-member decoder stops after the first block...
    let mut first = Vec::new();
    flate2::read::GzDecoder::new(&out[..])
        .read_to_end(&mut first)
        .unwrap();
    assert_eq!(first, &data[..4096]);

    // ...while a multi-member decoder sees the whole stream.
    let mut all = Vec::new();
    flate2::read::MultiGzDecoder::new(&out[..])
        .read_to_end(&mut all)
        .unwrap();
    assert_eq!(all, data);
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = ParallelWriter::new(Vec::new(), Arc::new(PassThroughCodec), config(0, 1, 1))
        .err()
        .unwrap();
    assert!(matches!(err, StreamError::InvalidConfig(_)));
}

#[test]
fn test_drop_without_close_does_not_hang() {
    let mut w = ParallelWriter::new(Vec::new(), Arc::new(JitterCodec::new(5)), config(64, 2, 2)).unwrap();
    w.write(&compressible_bytes(4096)).unwrap();
    drop(w);
}
