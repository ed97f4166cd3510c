//! The request/response handshake between a stream façade and its
//! compression worker. Grounded on TPIE's `compressor_request` /
//! `compressor_response` pair in `tpie/compressed/thread.h`: the foreground
//! builds a request carrying a buffer handle, hands it to the worker's
//! queue, and blocks on a per-request completion slot rather than on the
//! queue itself, so a second request can be queued while the first is still
//! in flight, giving read-ahead / write-behind pipelining.

use std::sync::{Arc, Condvar, Mutex};

use crate::buffer::BufferHandle;
use crate::error::{Result, StreamError};

/// Outcome of a completed read: how many bytes landed in the buffer, the
/// compressed size of the block just read (so a caller can resume here later
/// without a prefix read), and the speculative prefix of the block that
/// follows (see `process_read_request` in the TPIE original), so the next
/// read can skip a second seek+read.
#[derive(Debug, Clone, Copy)]
pub struct ReadOutcome {
    pub bytes_decompressed: usize,
    pub block_compressed_len: u64,
    pub next_block_offset: u64,
    /// `None` once the speculative read finds no further length prefix.
    pub next_block_compressed_len: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct WriteOutcome {
    pub block_offset: u64,
    pub compressed_len: u64,
}

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Read(ReadOutcome),
    Write(WriteOutcome),
    Truncated,
}

struct ResponseState {
    done: bool,
    outcome: Option<Outcome>,
    error: Option<StreamError>,
}

/// A single request's completion slot. Cloned (via `Arc`) into both the
/// request enqueued on the worker and the façade's wait point.
pub struct Response {
    state: Mutex<ResponseState>,
    cv: Condvar,
}

impl Response {
    pub fn new() -> Arc<Self> {
        Arc::new(Response {
            state: Mutex::new(ResponseState {
                done: false,
                outcome: None,
                error: None,
            }),
            cv: Condvar::new(),
        })
    }

    pub fn complete(&self, outcome: Outcome) {
        let mut state = self.state.lock().unwrap();
        state.outcome = Some(outcome);
        state.done = true;
        self.cv.notify_all();
    }

    pub fn fail(&self, err: StreamError) {
        let mut state = self.state.lock().unwrap();
        state.error = Some(err);
        state.done = true;
        self.cv.notify_all();
    }

    /// Block until the worker marks this request done, then consume the
    /// result. Calling `wait` twice on the same response after it has
    /// completed returns the same outcome/error again (the error is kept
    /// `Clone`-able for exactly this reason).
    pub fn wait(&self) -> Result<Outcome> {
        let mut state = self.state.lock().unwrap();
        while !state.done {
            state = self.cv.wait(state).unwrap();
        }
        if let Some(err) = &state.error {
            return Err(err.clone());
        }
        Ok(state.outcome.expect("completed response carries an outcome"))
    }
}

/// Work item enqueued on a compression worker. Every variant carries the
/// response slot the caller is going to wait on.
pub enum Request {
    /// Decompress the block at `offset` into `buffer`. `compressed_len_hint`
    /// is the block's compressed size if a previous speculative read already
    /// learned it, or 0 to mean "read the length prefix to learn it."
    Read {
        offset: u64,
        compressed_len_hint: u64,
        buffer: BufferHandle,
        response: Arc<Response>,
    },
    /// Compress the first `len` bytes of `buffer`, containing `item_count`
    /// records, and append the framed block to the file.
    Write {
        buffer: BufferHandle,
        len: usize,
        item_count: u64,
        response: Arc<Response>,
    },
    /// Drop every block and reset the item count to zero.
    Truncate { response: Arc<Response> },

    /// Ask the worker thread to exit its loop; sent on stream close.
    Shutdown,
}
