mod gzip_codec;
mod lz4_codec;
mod passthrough;
mod zstd_codec;

pub use gzip_codec::GzipCodec;
pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zstd_codec::ZstdCodec;

use pargz_core::Codec;
use std::sync::Arc;

/// Resolve a codec from its CLI name.
///
/// `level` applies to gzip (0–9) and zstd (1–22); other codecs ignore it.
/// `None` picks the codec's default level.
pub fn codec_by_name(name: &str, level: Option<i32>) -> anyhow::Result<Arc<dyn Codec>> {
    match name {
        "gzip" | "gz" => {
            let codec = match level {
                Some(level) => GzipCodec::new(u32::try_from(level).map_err(|_| {
                    anyhow::anyhow!("gzip level must be between 0 and 9, got {}", level)
                })?)?,
                None => GzipCodec::default(),
            };
            Ok(Arc::new(codec))
        }
        "zstd" | "z" => {
            let codec = match level {
                Some(level) => ZstdCodec::new(level)?,
                None => ZstdCodec::default(),
            };
            Ok(Arc::new(codec))
        }
        "lz4" | "l" => Ok(Arc::new(Lz4Codec)),
        "passthrough" | "pass" | "none" => Ok(Arc::new(PassThroughCodec)),
        other => anyhow::bail!(
            "unknown codec '{}'. Valid options: gzip, zstd, lz4, passthrough",
            other
        ),
    }
}
