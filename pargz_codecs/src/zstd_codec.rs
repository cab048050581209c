use pargz_core::Codec;

/// Zstandard codec; one zstd frame per block.
///
/// The zstd streaming decoder continues into the next frame when one ends,
/// so the ordered stream decodes in a single pass.
pub struct ZstdCodec {
    level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self {
            level: zstd::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl ZstdCodec {
    /// Build a codec at `level`, which must lie in the range the linked
    /// libzstd supports (negative "fast" levels up to 22).
    pub fn new(level: i32) -> anyhow::Result<Self> {
        let range = zstd::compression_level_range();
        if !range.contains(&level) {
            anyhow::bail!(
                "zstd level must be between {} and {}, got {}",
                range.start(),
                range.end(),
                level
            );
        }
        Ok(Self { level })
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(zstd::bulk::compress(raw, self.level)?)
    }

    fn decompress_stream(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        if compressed.is_empty() {
            return Ok(Vec::new());
        }
        Ok(zstd::stream::decode_all(compressed)?)
    }
}
