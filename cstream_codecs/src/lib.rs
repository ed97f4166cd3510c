mod lz4_codec;
mod zstd_codec;

pub use lz4_codec::Lz4Codec;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

use cstream_core::error::{Result, StreamError};
use cstream_core::{Codec, PassthroughCodec, CODEC_LZ4, CODEC_PASSTHROUGH, CODEC_ZSTD};

/// Resolve a codec from its on-disk `codec_id`, as stored in a stream's
/// header. Used by callers that want to reopen a stream without already
/// knowing which codec wrote it.
pub fn codec_by_id(id: u16) -> Result<Arc<dyn Codec>> {
    match id {
        CODEC_PASSTHROUGH => Ok(Arc::new(PassthroughCodec)),
        CODEC_ZSTD => Ok(Arc::new(ZstdCodec::default())),
        CODEC_LZ4 => Ok(Arc::new(Lz4Codec)),
        other => Err(StreamError::InvalidFile(format!(
            "unknown codec id {other}; supports 0 (passthrough), 1 (zstd), 2 (lz4)"
        ))),
    }
}
