pub mod accessor;
pub mod buffer;
pub mod codec;
pub mod error;
pub mod format;
pub mod memory;
pub mod position;
pub mod request;
pub mod stream;
mod worker;

pub use accessor::CacheHint;
pub use codec::{Codec, PassthroughCodec, CODEC_LZ4, CODEC_PASSTHROUGH, CODEC_ZSTD};
pub use error::{Result, StreamError};
pub use memory::{MemoryManager, NoopMemoryManager};
pub use position::StreamPosition;
pub use stream::{OpenMode, SeekKind, Stream, StreamOptions};
