//! The caller-facing façade, grounded on `tpie::compressed_stream<T>` in
//! `tpie/compressed/stream.h`: item cursor, seek/position, read/write/
//! can_read, and the Clean/Reading/Writing state machine described there.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use tempfile::NamedTempFile;

use crate::accessor::{CacheHint, FileAccessor};
use crate::buffer::{BufferHandle, BufferPool};
use crate::codec::{Codec, PassthroughCodec};
use crate::error::{Result, StreamError};
use crate::format::HEADER_SIZE;
use crate::memory::{MemoryManager, NoopMemoryManager};
use crate::position::StreamPosition;
use crate::request::{Outcome, Request, Response};
use crate::worker::CompressionWorker;

/// The role a stream was opened in. There is no read-write mode that allows
/// interleaved reads and writes without a seek in between: a stream opened
/// `ReadWrite` may use either role, but switching requires passing through
/// `Clean` the same as a single-role stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekKind {
    Beginning,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Clean,
    Reading,
    Writing,
}

/// Construction-time parameters, bundling the `create(path, codec,
/// block_size)`-style argument list into a builder.
#[derive(Clone)]
pub struct StreamOptions {
    pub block_size: u64,
    pub codec: Arc<dyn Codec>,
    pub cache_hint: CacheHint,
    pub allow_unclean: bool,
    pub memory: Arc<dyn MemoryManager>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            block_size: crate::format::DEFAULT_BLOCK_SIZE,
            codec: Arc::new(PassthroughCodec),
            cache_hint: CacheHint::default(),
            allow_unclean: false,
            memory: Arc::new(NoopMemoryManager),
        }
    }
}

/// A random-accessible sequence of fixed-size `T` records backed by a file
/// of independently compressed blocks.
pub struct Stream<T: Pod + Zeroable> {
    worker: CompressionWorker,
    pool: Arc<BufferPool>,
    memory: Arc<dyn MemoryManager>,
    mode: OpenMode,
    path: PathBuf,
    _temp: Option<NamedTempFile>,

    item_size: u32,
    block_size: u64,
    block_items: u64,

    state: State,
    broken: bool,

    cur_buffer: Option<BufferHandle>,
    /// Session-local block sequence number (dense from zero for the
    /// lifetime of this `Stream` value, not across reopens — see DESIGN.md).
    block_seq: u64,
    /// File offset of `cur_buffer`'s block's length prefix.
    current_block_offset: u64,
    /// Compressed size of `cur_buffer`'s block, learned when it was fetched;
    /// 0 means unknown (not yet fetched). Carried into `StreamPosition` so a
    /// later `set_position` back to this spot can skip the prefix read.
    current_block_compressed_len: u64,
    /// Next item slot to read from, or next item slot to fill, in `cur_buffer`.
    item_index: u64,
    /// Item count buffered in the write-side `cur_buffer` so far.
    write_item_count: u64,

    read_cursor_offset: u64,
    next_read_offset: u64,
    next_block_present: Option<bool>,
    /// Compressed size of the block at `next_read_offset`, valid only when
    /// `next_block_present == Some(true)`; 0 means unknown.
    next_block_compressed_len: u64,
    deferred_seek: Option<StreamPosition>,

    pending: Option<Arc<Response>>,

    total_items: u64,
    cursor: u64,

    _marker: PhantomData<fn() -> T>,
}

impl<T: Pod + Zeroable> Stream<T> {
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, options: StreamOptions) -> Result<Self> {
        let path = path.as_ref();
        let writable = matches!(mode, OpenMode::Write | OpenMode::ReadWrite);
        let item_size = std::mem::size_of::<T>() as u32;
        let block_size = options.block_size;

        let accessor = if path.exists() {
            FileAccessor::open_existing(
                path,
                item_size,
                block_size,
                writable,
                options.allow_unclean,
                options.cache_hint,
            )?
        } else if writable {
            FileAccessor::create_new(path, item_size, block_size, options.codec.id(), options.cache_hint)?
        } else {
            return Err(StreamError::InvalidFile(
                "no such stream file and stream was opened read-only".to_string(),
            ));
        };

        let total_items = accessor.item_count();
        let block_items = block_size / item_size as u64;

        let worker = CompressionWorker::spawn(accessor, options.codec.clone());
        let pool = Arc::new(BufferPool::new(block_size as usize, 2));
        options.memory.charge(block_size * 2);

        Ok(Stream {
            worker,
            pool,
            memory: options.memory,
            mode,
            path: path.to_path_buf(),
            _temp: None,
            item_size,
            block_size,
            block_items,
            state: State::Clean,
            broken: false,
            cur_buffer: None,
            block_seq: 0,
            current_block_offset: HEADER_SIZE,
            current_block_compressed_len: 0,
            item_index: 0,
            write_item_count: 0,
            read_cursor_offset: HEADER_SIZE,
            next_read_offset: HEADER_SIZE,
            next_block_present: None,
            next_block_compressed_len: 0,
            deferred_seek: None,
            pending: None,
            total_items,
            cursor: 0,
            _marker: PhantomData,
        })
    }

    /// Convenience constructor matching `compressed_stream::open()` with no
    /// path argument in the TPIE original: a stream backed by a temp file
    /// that is deleted when the returned value is dropped.
    pub fn open_temp(options: StreamOptions) -> Result<Self> {
        let temp = NamedTempFile::new()?;
        let path = temp.path().to_path_buf();
        // `create_new` expects the path to be absent; the real stream file
        // is written to the same path right after. `temp` is kept around
        // only so its `Drop` unlinks that path (whatever occupies it by
        // then) once the stream is torn down.
        std::fs::remove_file(&path)?;
        let mut stream = Self::open(&path, OpenMode::ReadWrite, options)?;
        stream._temp = Some(temp);
        Ok(stream)
    }

    pub fn is_open(&self) -> bool {
        !self.broken
    }

    pub fn size(&self) -> u64 {
        self.total_items
    }

    pub fn offset(&self) -> u64 {
        self.cursor
    }

    fn check_open(&self) -> Result<()> {
        if self.broken {
            return Err(StreamError::NotOpen);
        }
        Ok(())
    }

    fn settle_pending(&mut self) -> Result<()> {
        if let Some(resp) = self.pending.take() {
            if let Err(err) = resp.wait() {
                self.broken = true;
                return Err(err);
            }
        }
        Ok(())
    }

    fn cur_buffer_item_count(&self) -> u64 {
        match &self.cur_buffer {
            Some(buf) => buf.lock().unwrap().len() as u64 / self.item_size as u64,
            None => 0,
        }
    }

    fn cur_buffer_has_item(&self) -> bool {
        self.item_index < self.cur_buffer_item_count()
    }

    /// Issue a READ request for the block whose length prefix is at
    /// `offset`, wait for it, and install the result as `cur_buffer`.
    /// `compressed_len_hint` is the block's compressed size if already known
    /// from an earlier speculative read, or 0 to have the worker read the
    /// length prefix to learn it.
    fn fetch_block(&mut self, offset: u64, compressed_len_hint: u64) -> Result<()> {
        self.settle_pending()?;
        let buffer = self.pool.acquire(self.block_seq);
        {
            buffer.lock().unwrap().clear();
        }
        let response = Response::new();
        self.worker.submit(Request::Read {
            offset,
            compressed_len_hint,
            buffer: buffer.clone(),
            response: response.clone(),
        });
        let outcome = response.wait().map_err(|e| {
            self.broken = true;
            e
        })?;
        self.pool.notify_reclaim();

        let Outcome::Read(r) = outcome else {
            unreachable!("read request always completes with a read outcome")
        };

        self.current_block_offset = offset;
        if r.bytes_decompressed == 0 && r.next_block_compressed_len.is_none() {
            self.cur_buffer = None;
            self.current_block_compressed_len = 0;
            self.next_block_present = Some(false);
            self.next_block_compressed_len = 0;
            return Ok(());
        }

        self.cur_buffer = Some(buffer);
        self.current_block_compressed_len = r.block_compressed_len;
        self.next_read_offset = r.next_block_offset;
        self.next_block_present = Some(r.next_block_compressed_len.is_some());
        self.next_block_compressed_len = r.next_block_compressed_len.unwrap_or(0);
        Ok(())
    }

    fn begin_reading(&mut self) {
        self.state = State::Reading;
        self.block_seq = 0;
        self.read_cursor_offset = HEADER_SIZE;
        self.cur_buffer = None;
        self.current_block_compressed_len = 0;
        self.item_index = 0;
        self.next_block_present = None;
        self.next_block_compressed_len = 0;
    }

    fn begin_writing(&mut self) -> Result<()> {
        self.state = State::Writing;
        let buffer = self.pool.acquire(self.block_seq);
        {
            buffer.lock().unwrap().clear();
        }
        self.cur_buffer = Some(buffer);
        self.item_index = 0;
        self.write_item_count = 0;
        Ok(())
    }

    fn resolve_deferred_seek(&mut self) -> Result<()> {
        let pos = self.deferred_seek.take().expect("resolve_deferred_seek called with none pending");
        self.block_seq = pos.block_number;
        self.fetch_block(pos.read_offset, pos.block_compressed_len)?;
        self.item_index = pos.block_item_index;
        Ok(())
    }

    /// Advance into the next block, either the first block of a fresh
    /// reading session or the one following the exhausted current buffer.
    fn advance_block(&mut self) -> Result<()> {
        if self.cur_buffer.is_none() && self.next_block_present.is_none() {
            self.fetch_block(self.read_cursor_offset, 0)?;
        } else {
            self.block_seq += 1;
            let offset = self.next_read_offset;
            let hint = if self.next_block_present == Some(true) {
                self.next_block_compressed_len
            } else {
                0
            };
            self.fetch_block(offset, hint)?;
        }
        self.item_index = 0;
        Ok(())
    }

    pub fn can_read(&mut self) -> Result<bool> {
        self.check_open()?;
        if self.mode == OpenMode::Write {
            return Ok(false);
        }
        if self.state == State::Writing {
            return Ok(false);
        }
        if self.state == State::Clean {
            self.begin_reading();
        }
        if self.deferred_seek.is_some() {
            self.resolve_deferred_seek()?;
        }
        if self.cur_buffer_has_item() {
            return Ok(true);
        }
        match self.next_block_present {
            Some(false) => Ok(false),
            Some(true) => Ok(true),
            None => {
                self.advance_block()?;
                Ok(self.cur_buffer_has_item())
            }
        }
    }

    pub fn read(&mut self) -> Result<T> {
        self.check_open()?;
        if self.mode == OpenMode::Write {
            return Err(StreamError::WriteOnly);
        }
        if self.state == State::Writing {
            return Err(StreamError::UnsupportedSeek(
                "stream is positioned for writing; seek before reading",
            ));
        }
        if self.state == State::Clean {
            self.begin_reading();
        }
        if self.deferred_seek.is_some() {
            self.resolve_deferred_seek()?;
        }
        if !self.cur_buffer_has_item() {
            if self.next_block_present == Some(false) {
                return Err(StreamError::EndOfStream);
            }
            self.advance_block()?;
        }
        if !self.cur_buffer_has_item() {
            return Err(StreamError::EndOfStream);
        }

        let item = {
            let buf = self.cur_buffer.as_ref().unwrap();
            let guard = buf.lock().unwrap();
            let start = self.item_index as usize * self.item_size as usize;
            let bytes = &guard.as_slice()[start..start + self.item_size as usize];
            *bytemuck::from_bytes::<T>(bytes)
        };
        self.item_index += 1;
        self.cursor += 1;
        Ok(item)
    }

    pub fn read_all(&mut self, n: usize) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read()?);
        }
        Ok(out)
    }

    fn submit_current_write_block(&mut self) -> Result<()> {
        self.settle_pending()?;
        let buffer = self
            .cur_buffer
            .take()
            .expect("submit_current_write_block called without a buffer");
        let len = self.item_index as usize * self.item_size as usize;
        let item_count = self.write_item_count;
        let response = Response::new();
        self.worker.submit(Request::Write {
            buffer,
            len,
            item_count,
            response: response.clone(),
        });
        self.pending = Some(response);
        self.item_index = 0;
        self.write_item_count = 0;
        Ok(())
    }

    pub fn write(&mut self, item: T) -> Result<()> {
        self.check_open()?;
        if self.mode == OpenMode::Read {
            return Err(StreamError::ReadOnly);
        }
        if self.state == State::Reading {
            return Err(StreamError::UnsupportedSeek(
                "stream is positioned for reading; seek before writing",
            ));
        }
        if self.state == State::Clean {
            self.begin_writing()?;
        }

        {
            let buf = self.cur_buffer.as_ref().unwrap();
            let mut guard = buf.lock().unwrap();
            let bytes = bytemuck::bytes_of(&item);
            let start = self.item_index as usize * self.item_size as usize;
            let end = start + bytes.len();
            guard.full_mut()[start..end].copy_from_slice(bytes);
            guard.set_len(end);
        }
        self.item_index += 1;
        self.write_item_count += 1;
        self.total_items += 1;
        self.cursor += 1;

        if self.item_index >= self.block_items {
            self.submit_current_write_block()?;
            self.block_seq += 1;
            let next_buffer = self.pool.acquire(self.block_seq);
            {
                next_buffer.lock().unwrap().clear();
            }
            self.cur_buffer = Some(next_buffer);
        }
        Ok(())
    }

    pub fn write_all(&mut self, items: &[T]) -> Result<()> {
        for item in items {
            self.write(*item)?;
        }
        Ok(())
    }

    fn flush_if_writing(&mut self) -> Result<()> {
        if self.state == State::Writing {
            if self.cur_buffer.is_some() && self.item_index > 0 {
                self.submit_current_write_block()?;
            }
            self.settle_pending()?;
            self.cur_buffer = None;
            self.state = State::Clean;
        }
        Ok(())
    }

    pub fn seek(&mut self, kind: SeekKind) -> Result<()> {
        self.check_open()?;
        self.flush_if_writing()?;
        self.settle_pending()?;
        self.deferred_seek = None;
        self.cur_buffer = None;
        self.current_block_compressed_len = 0;
        self.block_seq = 0;
        self.item_index = 0;
        self.next_block_present = None;
        self.next_block_compressed_len = 0;
        match kind {
            SeekKind::Beginning => {
                self.state = State::Clean;
                self.read_cursor_offset = HEADER_SIZE;
                self.cursor = 0;
            }
            SeekKind::End => {
                if self.mode == OpenMode::Read {
                    return Err(StreamError::UnsupportedSeek(
                        "read-only stream cannot seek to end",
                    ));
                }
                self.state = State::Clean;
                self.cursor = self.total_items;
            }
        }
        Ok(())
    }

    /// Valid only while positioned for reading; captures the current
    /// block's prefix offset, its sequence number, its compressed size (so a
    /// later resume can skip the prefix read), and the in-block cursor.
    pub fn get_position(&self) -> Result<StreamPosition> {
        self.check_open()?;
        if self.state != State::Reading {
            return Err(StreamError::UnsupportedSeek(
                "get_position requires the stream to be positioned for reading",
            ));
        }
        Ok(StreamPosition::new(
            self.current_block_offset,
            self.block_seq,
            self.item_index,
            self.current_block_compressed_len,
        ))
    }

    /// Parks the façade in a deferred seek; the actual READ happens on the
    /// next call to `read` or `can_read`.
    pub fn set_position(&mut self, pos: StreamPosition) -> Result<()> {
        self.check_open()?;
        if self.mode == OpenMode::Write {
            return Err(StreamError::WriteOnly);
        }
        self.flush_if_writing()?;
        self.state = State::Reading;
        self.cur_buffer = None;
        self.deferred_seek = Some(pos);
        Ok(())
    }

    /// Drops every block and resets the item count to zero — the only
    /// supported truncation.
    pub fn truncate(&mut self) -> Result<()> {
        self.check_open()?;
        if self.mode == OpenMode::Read {
            return Err(StreamError::ReadOnly);
        }
        self.flush_if_writing()?;
        self.settle_pending()?;

        let response = Response::new();
        self.worker.submit(Request::Truncate {
            response: response.clone(),
        });
        response.wait().map_err(|e| {
            self.broken = true;
            e
        })?;

        self.state = State::Clean;
        self.cur_buffer = None;
        self.current_block_compressed_len = 0;
        self.deferred_seek = None;
        self.block_seq = 0;
        self.item_index = 0;
        self.write_item_count = 0;
        self.read_cursor_offset = HEADER_SIZE;
        self.next_read_offset = HEADER_SIZE;
        self.next_block_present = None;
        self.next_block_compressed_len = 0;
        self.total_items = 0;
        self.cursor = 0;
        Ok(())
    }

    pub fn describe(&self) -> String {
        format!(
            "cstream(path={}, mode={:?}, state={:?}, block_seq={}, item_index={}, items={}, open={})",
            self.path.display(),
            self.mode,
            self.state,
            self.block_seq,
            self.item_index,
            self.total_items,
            !self.broken
        )
    }

    /// Flush any dirty write buffer, drain outstanding requests, and set
    /// the header's clean flag — unless the stream is already broken, in
    /// which case the file is closed without the clean flag.
    pub fn close(mut self) -> Result<()> {
        let flush_result = self.flush_if_writing();
        let settle_result = self.settle_pending();
        let clean = flush_result.is_ok() && settle_result.is_ok() && !self.broken;

        let accessor = self.worker.shutdown();
        let memory = self.memory.clone();
        memory.refund(self.block_size * 2);
        let close_result = accessor.close(clean);

        flush_result?;
        settle_result?;
        close_result?;
        Ok(())
    }
}
