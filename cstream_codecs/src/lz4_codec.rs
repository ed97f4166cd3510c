use cstream_core::error::{Result, StreamError};
use cstream_core::{Codec, CODEC_LZ4};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};

/// LZ4 block codec. Fastest decompression of the bundled codecs — suited to
/// hot data and low-latency random access workloads.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn id(&self) -> u16 {
        CODEC_LZ4
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn max_compressed_len(&self, raw_len: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(raw_len) + std::mem::size_of::<u32>()
    }

    fn compress(&self, src: &[u8]) -> Result<Vec<u8>> {
        Ok(compress_prepend_size(src))
    }

    fn decompress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let decoded = decompress_size_prepended(src)
            .map_err(|e| StreamError::CodecFailure(format!("lz4 decompress: {e}")))?;
        if decoded.len() > dst.len() {
            return Err(StreamError::CodecFailure(
                "lz4 decompressed block exceeds buffer capacity".to_string(),
            ));
        }
        dst[..decoded.len()].copy_from_slice(&decoded);
        Ok(decoded.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let codec = Lz4Codec;
        let src: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let compressed = codec.compress(&src).unwrap();
        let mut dst = vec![0u8; src.len()];
        let n = codec.decompress_into(&compressed, &mut dst).unwrap();
        assert_eq!(&dst[..n], src.as_slice());
    }
}
