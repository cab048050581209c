/// Core compression abstraction.
///
/// Each `Codec` implementation:
/// - Must compress individual blocks independently. No cross-block state is
///   permitted, because blocks are compressed on whichever worker picks them up.
/// - Must emit a self-terminated unit per block (a gzip member, a zstd frame,
///   an lz4 frame...) so that the in-order concatenation of units is itself a
///   valid compressed stream.
pub trait Codec: Send + Sync {
    /// Human-readable codec name for CLI display and logs.
    fn name(&self) -> &'static str;

    /// Compress a single independent block into one self-contained unit.
    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Decode the in-order concatenation of units produced by
    /// [`compress_block`](Codec::compress_block).
    ///
    /// An empty input decodes to an empty output.
    fn decompress_stream(&self, compressed: &[u8]) -> anyhow::Result<Vec<u8>>;
}
