#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender};
use pargz_codecs::GzipCodec;
use pargz_core::Codec;

/// Generate `len` deterministic bytes using a simple LCG.
pub fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Generate `len` highly compressible bytes (repeating pattern).
pub fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"the quick brown fox jumps over the lazy dog. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

/// In-memory sink the test keeps a handle to after the writer takes ownership.
#[derive(Clone, Default)]
pub struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory sink that reports, through shared flags, when it was flushed
/// and when it was dropped.
#[derive(Default)]
pub struct TrackedSink {
    pub inner: SharedSink,
    pub flushes: Arc<AtomicUsize>,
    pub dropped: Arc<AtomicBool>,
}

impl Write for TrackedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for TrackedSink {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// Sink that accepts `budget` bytes and then fails every write.
pub struct FailingSink {
    pub budget: usize,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() > self.budget {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.budget -= buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Gzip with a per-block delay derived from the block contents, so blocks
/// finish compressing in a scrambled order.
pub struct JitterCodec {
    pub inner: GzipCodec,
    pub max_delay_ms: u64,
}

impl JitterCodec {
    pub fn new(max_delay_ms: u64) -> Self {
        Self {
            inner: GzipCodec::new(1).unwrap(),
            max_delay_ms,
        }
    }
}

impl Codec for JitterCodec {
    fn name(&self) -> &'static str {
        "jitter-gzip"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let seed = raw
            .iter()
            .take(64)
            .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                (h ^ *b as u64).wrapping_mul(0x0100_0000_01b3)
            });
        thread::sleep(Duration::from_millis(seed % (self.max_delay_ms + 1)));
        self.inner.compress_block(raw)
    }

    fn decompress_stream(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        self.inner.decompress_stream(compressed)
    }
}

/// Passthrough that refuses any block whose first byte is `poison`, after an
/// optional delay.
pub struct PoisonCodec {
    pub poison: u8,
    pub delay: Duration,
}

impl Codec for PoisonCodec {
    fn name(&self) -> &'static str {
        "poison"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        thread::sleep(self.delay);
        if raw.first() == Some(&self.poison) {
            anyhow::bail!("poisoned block starting with {:#04x}", self.poison);
        }
        Ok(raw.to_vec())
    }

    fn decompress_stream(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}

/// Passthrough that panics on every block.
pub struct PanickingCodec;

impl Codec for PanickingCodec {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn compress_block(&self, _raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        panic!("codec exploded")
    }

    fn decompress_stream(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}

/// Passthrough whose `compress_block` announces itself on `entered` and then
/// parks until `release` yields a permit or is disconnected.
pub struct GatedCodec {
    pub entered: Sender<Vec<u8>>,
    pub release: Receiver<()>,
}

impl Codec for GatedCodec {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let _ = self.entered.send(raw.to_vec());
        let _ = self.release.recv();
        Ok(raw.to_vec())
    }

    fn decompress_stream(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}
