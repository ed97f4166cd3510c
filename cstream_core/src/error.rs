use std::io;

/// Everything a compressed stream operation can fail with.
///
/// Errors raised inside the compression worker are attached to the response
/// the foreground is waiting on and only surface on the next call that waits
/// on that response; errors raised directly on the foreground (bad mode,
/// closed stream, unsupported seek) surface immediately.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("stream is not open")]
    NotOpen,

    #[error("stream is read-only")]
    ReadOnly,

    #[error("stream is write-only")]
    WriteOnly,

    #[error("non-appending write attempted")]
    NonAppendingWrite,

    #[error("end of stream")]
    EndOfStream,

    #[error("unsupported seek: {0}")]
    UnsupportedSeek(&'static str),

    #[error("invalid file: {0}")]
    InvalidFile(String),

    #[error("truncated file: expected {expected} bytes, got {got}")]
    TruncatedFile { expected: usize, got: usize },

    #[error("codec failure: {0}")]
    CodecFailure(String),

    #[error("io failure: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;

impl Clone for StreamError {
    /// Worker-side errors are stashed on a shared response slot and may need
    /// to be read more than once (e.g. by `close` after a failed wait), so
    /// the error needs to be cheaply duplicable. `io::Error` doesn't impl
    /// `Clone`, so it's flattened to its message on the way through.
    fn clone(&self) -> Self {
        match self {
            StreamError::NotOpen => StreamError::NotOpen,
            StreamError::ReadOnly => StreamError::ReadOnly,
            StreamError::WriteOnly => StreamError::WriteOnly,
            StreamError::NonAppendingWrite => StreamError::NonAppendingWrite,
            StreamError::EndOfStream => StreamError::EndOfStream,
            StreamError::UnsupportedSeek(s) => StreamError::UnsupportedSeek(s),
            StreamError::InvalidFile(s) => StreamError::InvalidFile(s.clone()),
            StreamError::TruncatedFile { expected, got } => StreamError::TruncatedFile {
                expected: *expected,
                got: *got,
            },
            StreamError::CodecFailure(s) => StreamError::CodecFailure(s.clone()),
            StreamError::Io(e) => StreamError::Io(io::Error::new(e.kind(), e.to_string())),
        }
    }
}
