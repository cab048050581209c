use std::io::{Read, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pargz_core::Codec;

/// Gzip block codec.
///
/// Every block becomes one complete gzip member. RFC 1952 allows members to
/// be concatenated, so the ordered output of a parallel stream is a regular
/// `.gz` file that `gunzip` and any multi-member decoder can read.
pub struct GzipCodec {
    /// Deflate level (0 = store, 9 = smallest).
    pub level: u32,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl GzipCodec {
    pub fn new(level: u32) -> anyhow::Result<Self> {
        if level > 9 {
            anyhow::bail!("gzip level must be between 0 and 9, got {}", level);
        }
        Ok(Self { level })
    }
}

impl Codec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(
            Vec::with_capacity(raw.len() / 2 + 64),
            Compression::new(self.level),
        );
        encoder.write_all(raw)?;
        Ok(encoder.finish()?)
    }

    fn decompress_stream(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        if compressed.is_empty() {
            return Ok(Vec::new());
        }
        let mut raw = Vec::new();
        MultiGzDecoder::new(compressed).read_to_end(&mut raw)?;
        Ok(raw)
    }
}
