//! Uncompressed block buffers and the pool that hands them out.
//!
//! TPIE's block buffer pool pairs an index with a per-buffer reference count.
//! Rather than hand-rolling the reference count, each pool slot's buffer is
//! reached only through `Arc<Mutex<..>>` clones, so `Arc::strong_count` minus
//! the pool's own permanent clone *is* the reference count — a buffer is
//! free exactly when the pool's stored `Arc` is the only one left.

use std::sync::{Arc, Condvar, Mutex};

pub type BufferHandle = Arc<Mutex<BlockBuffer>>;

/// A fixed-capacity region holding up to `capacity` bytes of one block's
/// worth of records, plus the logical size currently in use.
pub struct BlockBuffer {
    data: Vec<u8>,
    len: usize,
}

impl BlockBuffer {
    fn new(capacity: usize) -> Self {
        BlockBuffer {
            data: vec![0u8; capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_len(&mut self, len: usize) {
        assert!(len <= self.data.len(), "block buffer overflow");
        self.len = len;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Full-capacity slice for the worker to decompress into; the caller
    /// follows up with `set_len` once the real size is known.
    pub fn full_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

struct Slot {
    block_number: Option<u64>,
    buffer: BufferHandle,
}

/// Bounded, content-addressed cache of uncompressed block buffers.
///
/// Two slots are sufficient for the façade's own steady-state usage (one
/// current buffer, one in flight with the worker), so the pool defaults to
/// a small fixed slot count rather than growing unbounded.
pub struct BufferPool {
    slots: Mutex<Vec<Slot>>,
    reclaimed: Condvar,
}

impl BufferPool {
    pub fn new(block_capacity: usize, slot_count: usize) -> Self {
        let slots = (0..slot_count.max(1))
            .map(|_| Slot {
                block_number: None,
                buffer: Arc::new(Mutex::new(BlockBuffer::new(block_capacity))),
            })
            .collect();
        BufferPool {
            slots: Mutex::new(slots),
            reclaimed: Condvar::new(),
        }
    }

    fn is_free(slot: &Slot) -> bool {
        Arc::strong_count(&slot.buffer) == 1
    }

    /// Acquire the buffer for `block_number`, blocking until one is free.
    /// Preference order: a resident buffer for this exact block first, then
    /// any free buffer, then wait for a reclaim.
    pub fn acquire(&self, block_number: u64) -> BufferHandle {
        let mut slots = self.slots.lock().unwrap();
        loop {
            if let Some(slot) = slots
                .iter()
                .find(|s| s.block_number == Some(block_number) && Self::is_free(s))
            {
                return slot.buffer.clone();
            }
            if let Some(slot) = slots.iter_mut().find(|s| Self::is_free(s)) {
                slot.block_number = Some(block_number);
                return slot.buffer.clone();
            }
            slots = self.reclaimed.wait(slots).unwrap();
        }
    }

    /// Wake anyone blocked in `acquire` after dropping a buffer reference.
    /// Cheap to over-call: a spurious wake just re-checks and waits again.
    pub fn notify_reclaim(&self) {
        self.reclaimed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_reuses_free_slot_for_same_block() {
        let pool = BufferPool::new(64, 2);
        let a = pool.acquire(0);
        drop(a);
        pool.notify_reclaim();
        let b = pool.acquire(0);
        assert_eq!(Arc::strong_count(&b), 1);
    }

    #[test]
    fn acquire_blocks_until_reclaim() {
        use std::thread;
        use std::time::Duration;

        let pool = Arc::new(BufferPool::new(64, 1));
        let held = pool.acquire(0);

        let pool2 = pool.clone();
        let handle = thread::spawn(move || pool2.acquire(1));

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        drop(held);
        pool.notify_reclaim();
        let acquired = handle.join().unwrap();
        assert_eq!(Arc::strong_count(&acquired), 1);
    }
}
