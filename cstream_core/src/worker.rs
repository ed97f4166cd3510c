//! The background compression worker: one `std::thread` per open stream,
//! grounded on `compressor_thread::impl::run()` and its two request
//! handlers in `tpie/compressed/thread.cpp`. Unlike the TPIE original's
//! single process-wide thread serving every open stream through one shared
//! queue, each stream here owns its worker outright — simpler lifetime, no
//! global lock contention between unrelated streams.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::accessor::FileAccessor;
use crate::codec::Codec;
use crate::error::{Result, StreamError};
use crate::request::{Outcome, ReadOutcome, Request, WriteOutcome};

struct Queue {
    items: Mutex<VecDeque<Request>>,
    cv: Condvar,
}

impl Queue {
    fn new() -> Self {
        Queue {
            items: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
        }
    }

    fn push(&self, req: Request) {
        self.items.lock().unwrap().push_back(req);
        self.cv.notify_all();
    }

    fn pop(&self) -> Request {
        let mut items = self.items.lock().unwrap();
        while items.is_empty() {
            items = self.cv.wait(items).unwrap();
        }
        items.pop_front().unwrap()
    }
}

/// Handle to a running compression worker. Dropping it without calling
/// `shutdown` leaks the thread (it will block forever waiting on the
/// queue); `Stream::close` always calls `shutdown` first.
pub struct CompressionWorker {
    queue: Arc<Queue>,
    handle: Option<JoinHandle<FileAccessor>>,
}

impl CompressionWorker {
    pub fn spawn(accessor: FileAccessor, codec: Arc<dyn Codec>) -> Self {
        let queue = Arc::new(Queue::new());
        let worker_queue = queue.clone();
        let handle = thread::spawn(move || Self::run(accessor, codec, worker_queue));
        CompressionWorker {
            queue,
            handle: Some(handle),
        }
    }

    pub fn submit(&self, req: Request) {
        self.queue.push(req);
    }

    /// Ask the worker to exit and hand back ownership of the file accessor,
    /// so the caller can perform a final header rewrite on a quiesced file.
    pub fn shutdown(&mut self) -> FileAccessor {
        self.queue.push(Request::Shutdown);
        self.handle
            .take()
            .expect("shutdown called more than once")
            .join()
            .expect("compression worker thread panicked")
    }

    fn run(mut accessor: FileAccessor, codec: Arc<dyn Codec>, queue: Arc<Queue>) -> FileAccessor {
        loop {
            match queue.pop() {
                Request::Shutdown => return accessor,
                Request::Read {
                    offset,
                    compressed_len_hint,
                    buffer,
                    response,
                } => {
                    match Self::process_read(
                        &mut accessor,
                        codec.as_ref(),
                        offset,
                        compressed_len_hint,
                        &buffer,
                    ) {
                        Ok(outcome) => response.complete(Outcome::Read(outcome)),
                        Err(err) => response.fail(err),
                    }
                }
                Request::Write {
                    buffer,
                    len,
                    item_count,
                    response,
                } => {
                    match Self::process_write(&mut accessor, codec.as_ref(), &buffer, len, item_count)
                    {
                        Ok(outcome) => response.complete(Outcome::Write(outcome)),
                        Err(err) => response.fail(err),
                    }
                }
                Request::Truncate { response } => match accessor.truncate_all() {
                    Ok(()) => response.complete(Outcome::Truncated),
                    Err(err) => response.fail(err),
                },
            }
        }
    }

    /// Mirrors `process_read_request`'s `blockSize == 0` branch: when the
    /// caller already knows the block's compressed size (learned from a
    /// previous speculative read), skip the length-prefix read entirely and
    /// go straight to the data. Otherwise read the prefix first, same as
    /// the first read of a fresh stream. Either way, the data read also
    /// picks up the *next* block's length prefix in the same call, so the
    /// façade's next read doesn't need a seek of its own to discover how
    /// much to read.
    fn process_read(
        accessor: &mut FileAccessor,
        codec: &dyn Codec,
        offset: u64,
        compressed_len_hint: u64,
        buffer: &crate::buffer::BufferHandle,
    ) -> Result<ReadOutcome> {
        let compressed_len = if compressed_len_hint != 0 {
            compressed_len_hint
        } else {
            let mut prefix = [0u8; 8];
            let n = accessor.read(offset, &mut prefix)?;
            if n < prefix.len() {
                return Ok(ReadOutcome {
                    bytes_decompressed: 0,
                    block_compressed_len: 0,
                    next_block_offset: offset,
                    next_block_compressed_len: None,
                });
            }
            u64::from_le_bytes(prefix)
        };
        let data_offset = offset + 8;

        let mut trailing = vec![0u8; compressed_len as usize + 8];
        let got = accessor.read(data_offset, &mut trailing)? as u64;
        if got < compressed_len {
            return Err(StreamError::TruncatedFile {
                expected: compressed_len as usize,
                got: got as usize,
            });
        }
        let compressed = &trailing[..compressed_len as usize];

        let written = {
            let mut guard = buffer.lock().unwrap();
            let dst = guard.full_mut();
            let written = codec.decompress_into(compressed, dst)?;
            guard.set_len(written);
            written
        };

        let next_block_offset = data_offset + compressed_len;
        let next_block_compressed_len = if got >= compressed_len + 8 {
            let tail = &trailing[compressed_len as usize..compressed_len as usize + 8];
            Some(u64::from_le_bytes(tail.try_into().unwrap()))
        } else {
            None
        };

        Ok(ReadOutcome {
            bytes_decompressed: written,
            block_compressed_len: compressed_len,
            next_block_offset,
            next_block_compressed_len,
        })
    }

    /// Mirrors `process_write_request`: compress the block, frame it with
    /// its length prefix, and append. The header's item count is updated
    /// in memory only; it's rewritten to disk on open and on close, not
    /// after every block.
    fn process_write(
        accessor: &mut FileAccessor,
        codec: &dyn Codec,
        buffer: &crate::buffer::BufferHandle,
        len: usize,
        item_count: u64,
    ) -> Result<WriteOutcome> {
        let compressed = {
            let guard = buffer.lock().unwrap();
            codec.compress(&guard.as_slice()[..len])?
        };

        let mut framed = Vec::with_capacity(8 + compressed.len());
        framed.extend_from_slice(&(compressed.len() as u64).to_le_bytes());
        framed.extend_from_slice(&compressed);

        let block_offset = accessor.append(&framed)?;
        accessor.set_item_count(accessor.item_count() + item_count);

        Ok(WriteOutcome {
            block_offset,
            compressed_len: compressed.len() as u64,
        })
    }
}

impl Drop for CompressionWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.queue.push(Request::Shutdown);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}
