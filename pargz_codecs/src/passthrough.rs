use pargz_core::Codec;

/// No-op codec: emits blocks verbatim.
///
/// Useful for:
/// - Measuring the pipeline's own overhead independently of any codec.
/// - Data that is already compressed (e.g., JPEG, MP4) where further
///   compression would expand the output.
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress_stream(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}
