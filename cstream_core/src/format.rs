//! On-disk layout: a fixed header followed by length-prefixed compressed
//! blocks. See `stream_accessor<T>::{read,write,validate,fill}_header` in
//! the TPIE original for the field set this mirrors.

/// Sentinel identifying the format; checked verbatim on open.
pub const MAGIC: u64 = 0x4353_5452_4541_4D31; // "CSTREAM1" folded into 8 bytes, LE below
pub const VERSION: u32 = 1;

/// Fixed size of the stream header in bytes.
///   magic:u64 + version:u32 + item_size:u32 + block_size:u64
///   + user_data_size:u64 + max_user_data_size:u64 + item_count:u64
///   + codec_id:u16 + clean_close:u8 + reserved:u8
///   = 8 + 4 + 4 + 8 + 8 + 8 + 8 + 2 + 1 + 1 = 52, rounded up to 64 for alignment.
pub const HEADER_SIZE: u64 = 64;

/// Length of the 8-byte little-endian compressed-size prefix in front of
/// every block.
pub const LEN_PREFIX_SIZE: u64 = 8;

/// Default platform block size (one "page" worth of raw record bytes before
/// the block factor is applied).
pub const DEFAULT_BLOCK_SIZE: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub item_size: u32,
    pub block_size: u64,
    pub user_data_size: u64,
    pub max_user_data_size: u64,
    pub item_count: u64,
    pub codec_id: u16,
    pub clean_close: bool,
}

impl Header {
    pub fn new(item_size: u32, block_size: u64, codec_id: u16) -> Self {
        Header {
            version: VERSION,
            item_size,
            block_size,
            user_data_size: 0,
            max_user_data_size: 0,
            item_count: 0,
            codec_id,
            clean_close: false,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..8].copy_from_slice(&MAGIC.to_le_bytes());
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[12..16].copy_from_slice(&self.item_size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.block_size.to_le_bytes());
        buf[24..32].copy_from_slice(&self.user_data_size.to_le_bytes());
        buf[32..40].copy_from_slice(&self.max_user_data_size.to_le_bytes());
        buf[40..48].copy_from_slice(&self.item_count.to_le_bytes());
        buf[48..50].copy_from_slice(&self.codec_id.to_le_bytes());
        buf[50] = self.clean_close as u8;
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE as usize]) -> Result<Self, String> {
        let magic = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        if magic != MAGIC {
            return Err("header magic mismatch".to_string());
        }
        let version = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        if version != VERSION {
            return Err(format!("unsupported format version {version}"));
        }
        Ok(Header {
            version,
            item_size: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            block_size: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            user_data_size: u64::from_le_bytes(buf[24..32].try_into().unwrap()),
            max_user_data_size: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
            item_count: u64::from_le_bytes(buf[40..48].try_into().unwrap()),
            codec_id: u16::from_le_bytes(buf[48..50].try_into().unwrap()),
            clean_close: buf[50] != 0,
        })
    }

    /// Validate an on-disk header against the parameters the caller is
    /// opening with. A mismatch in item size or block size means the file
    /// was written by a different configuration and must not be silently
    /// adapted.
    pub fn validate(&self, item_size: u32, block_size: u64, allow_unclean: bool) -> Result<(), String> {
        if self.item_size != item_size {
            return Err(format!(
                "item size mismatch: file has {}, caller expects {}",
                self.item_size, item_size
            ));
        }
        if self.block_size != block_size {
            return Err(format!(
                "block size mismatch: file has {}, caller expects {}",
                self.block_size, block_size
            ));
        }
        if !self.clean_close && !allow_unclean {
            return Err("stream was not closed cleanly".to_string());
        }
        Ok(())
    }
}
