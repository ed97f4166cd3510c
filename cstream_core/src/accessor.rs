//! Byte-level file accessor: the external collaborator the worker speaks to.
//! Grounded on `tpie::file_accessor::posix` (raw fd-level read/write/seek/
//! truncate) composed with `tpie::file_accessor::stream_accessor` (the header
//! codec layered on top of it).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, StreamError};
use crate::format::{Header, HEADER_SIZE};

/// Advisory access pattern hint, plumbed down to `posix_fadvise` on Unix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheHint {
    #[default]
    Normal,
    Sequential,
    Random,
}

#[cfg(unix)]
fn apply_cache_hint(file: &File, hint: CacheHint) {
    use nix::fcntl::{posix_fadvise, PosixFadviseAdvice};
    use std::os::unix::io::AsRawFd;

    let advice = match hint {
        CacheHint::Normal => PosixFadviseAdvice::POSIX_FADV_NORMAL,
        CacheHint::Sequential => PosixFadviseAdvice::POSIX_FADV_SEQUENTIAL,
        CacheHint::Random => PosixFadviseAdvice::POSIX_FADV_RANDOM,
    };
    let _ = posix_fadvise(file.as_raw_fd(), 0, 0, advice);
}

#[cfg(not(unix))]
fn apply_cache_hint(_file: &File, _hint: CacheHint) {}

/// Positional read / append-only write / truncate / size over a single file,
/// plus the header fields layered on top (item count, clean flag, codec id).
///
/// Owned exclusively by the compression worker once a stream is open: the
/// foreground never touches the file directly.
pub struct FileAccessor {
    file: File,
    file_size: u64,
    header: Header,
}

impl FileAccessor {
    /// Open an existing stream file, validating its header against the
    /// caller's expected item size and block size.
    pub fn open_existing(
        path: &Path,
        item_size: u32,
        block_size: u64,
        writable: bool,
        allow_unclean: bool,
        cache_hint: CacheHint,
    ) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)?;
        apply_cache_hint(&file, cache_hint);

        let mut buf = [0u8; HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf)
            .map_err(|_| StreamError::InvalidFile("file shorter than header".to_string()))?;
        let header = Header::from_bytes(&buf).map_err(StreamError::InvalidFile)?;
        header
            .validate(item_size, block_size, allow_unclean)
            .map_err(StreamError::InvalidFile)?;

        let file_size = file.metadata()?.len();

        let mut accessor = FileAccessor {
            file,
            file_size,
            header,
        };
        if writable {
            accessor.header.clean_close = false;
            accessor.write_header()?;
        }
        Ok(accessor)
    }

    /// Create a brand new stream file with a fresh header.
    pub fn create_new(
        path: &Path,
        item_size: u32,
        block_size: u64,
        codec_id: u16,
        cache_hint: CacheHint,
    ) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        apply_cache_hint(&file, cache_hint);

        let header = Header::new(item_size, block_size, codec_id);
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.to_bytes())?;
        file.flush()?;

        Ok(FileAccessor {
            file,
            file_size: HEADER_SIZE,
            header,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Read exactly `dst.len()` bytes starting at `offset`, or fewer on a
    /// short read at end of file. Short reads are how callers detect
    /// end-of-stream on a length-prefix read.
    pub fn read(&mut self, offset: u64, dst: &mut [u8]) -> Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < dst.len() {
            match self.file.read(&mut dst[total..])? {
                0 => break,
                n => total += n,
            }
        }
        Ok(total)
    }

    /// Append `src` to the end of the file; returns the offset it was
    /// written at.
    pub fn append(&mut self, src: &[u8]) -> Result<u64> {
        let offset = self.file_size;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(src)?;
        self.file_size += src.len() as u64;
        Ok(offset)
    }

    pub fn truncate(&mut self, bytes: u64) -> Result<()> {
        self.file.set_len(bytes)?;
        self.file_size = bytes;
        Ok(())
    }

    /// Drop every block: truncate the file back to a bare header and reset
    /// the item count.
    pub fn truncate_all(&mut self) -> Result<()> {
        self.truncate(HEADER_SIZE)?;
        self.set_item_count(0);
        self.write_header()
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn item_count(&self) -> u64 {
        self.header.item_count
    }

    pub fn set_item_count(&mut self, count: u64) {
        self.header.item_count = count;
    }

    /// Rewrite the header in place. Called on every writable open (clean=false)
    /// and on close (clean=true).
    pub fn write_header(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.to_bytes())?;
        Ok(())
    }

    pub fn close(mut self, clean: bool) -> Result<()> {
        self.header.clean_close = clean;
        self.write_header()?;
        self.file.flush()?;
        Ok(())
    }
}
