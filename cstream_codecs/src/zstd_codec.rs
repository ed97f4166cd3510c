use cstream_core::error::{Result, StreamError};
use cstream_core::{Codec, CODEC_ZSTD};

/// Zstandard block codec. Each block compresses independently at the
/// configured level, so any block decompresses without touching its
/// neighbors.
///
/// Best for: general text, JSON, logs, mixed structured data.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn id(&self) -> u16 {
        CODEC_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn max_compressed_len(&self, raw_len: usize) -> usize {
        zstd::zstd_safe::compress_bound(raw_len)
    }

    fn compress(&self, src: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::compress(src, self.level)
            .map_err(|e| StreamError::CodecFailure(format!("zstd compress: {e}")))
    }

    fn decompress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        // zstd's frame carries the original content size, so we can decode
        // straight into the caller's buffer instead of an intermediate Vec.
        let mut decoder = zstd::bulk::Decompressor::new()
            .map_err(|e| StreamError::CodecFailure(format!("zstd decoder init: {e}")))?;
        decoder
            .decompress_to_buffer(src, dst)
            .map_err(|e| StreamError::CodecFailure(format!("zstd decompress: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let codec = ZstdCodec::default();
        let src: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let compressed = codec.compress(&src).unwrap();
        let mut dst = vec![0u8; src.len()];
        let n = codec.decompress_into(&compressed, &mut dst).unwrap();
        assert_eq!(&dst[..n], src.as_slice());
    }
}
