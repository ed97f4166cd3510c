use crate::error::Result;

/// Codec ids understood by `cstream_codecs`, persisted in the stream header
/// so a reopened stream can self-select its compressor.
pub const CODEC_PASSTHROUGH: u16 = 0;
pub const CODEC_ZSTD: u16 = 1;
pub const CODEC_LZ4: u16 = 2;

/// Block compression abstraction. Every implementation compresses and
/// decompresses whole blocks independently — no cross-block state — which is
/// what makes the speculative-next-prefix read and out-of-order reopening
/// possible. The uncompressed length is assumed to be recoverable from the
/// compressed bytes alone (both bundled codecs embed it in their framing).
pub trait Codec: Send + Sync {
    /// Stable id stored in the stream header.
    fn id(&self) -> u16;

    fn name(&self) -> &'static str;

    /// Upper bound on the compressed size of `raw_len` bytes; used to size
    /// the worker's scratch buffer before compressing.
    fn max_compressed_len(&self, raw_len: usize) -> usize;

    /// Compress `src` into a freshly allocated buffer.
    fn compress(&self, src: &[u8]) -> Result<Vec<u8>>;

    /// Decompress `src` into `dst`, returning the number of bytes written.
    /// `dst` is the uncompressed block buffer owned by the pool; it is
    /// caller-sized to the stream's block capacity, which bounds how large
    /// a block can legally decompress to.
    fn decompress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<usize>;
}

/// Stores each block verbatim. Lives in this crate rather than
/// `cstream_codecs` because it needs no external compression crate and is
/// the only codec the core crate can default to without creating a
/// dependency from core onto its own codec crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughCodec;

impl Codec for PassthroughCodec {
    fn id(&self) -> u16 {
        CODEC_PASSTHROUGH
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn max_compressed_len(&self, raw_len: usize) -> usize {
        raw_len
    }

    fn compress(&self, src: &[u8]) -> Result<Vec<u8>> {
        Ok(src.to_vec())
    }

    fn decompress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        if src.len() > dst.len() {
            return Err(crate::error::StreamError::CodecFailure(
                "decompressed block exceeds buffer capacity".to_string(),
            ));
        }
        dst[..src.len()].copy_from_slice(src);
        Ok(src.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_round_trips() {
        let codec = PassthroughCodec;
        let src = b"hello compressed world";
        let compressed = codec.compress(src).unwrap();
        let mut dst = vec![0u8; src.len()];
        let n = codec.decompress_into(&compressed, &mut dst).unwrap();
        assert_eq!(&dst[..n], src);
    }

    #[test]
    fn passthrough_rejects_oversize_decompress() {
        let codec = PassthroughCodec;
        let mut dst = vec![0u8; 2];
        assert!(codec.decompress_into(b"abc", &mut dst).is_err());
    }
}
