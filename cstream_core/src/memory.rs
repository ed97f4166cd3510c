//! Memory accounting hook. TPIE ties buffer pool sizing to a process-wide
//! memory manager singleton; this crate keeps the same seam as a trait
//! instead of a singleton, so a caller can wire in real accounting without
//! the rest of the crate depending on global state.

/// Charged when a stream reserves buffer capacity, refunded when it's
/// released. The default no-op implementation is what every stream uses
/// unless a caller supplies its own.
pub trait MemoryManager: Send + Sync {
    fn charge(&self, _bytes: u64) {}
    fn refund(&self, _bytes: u64) {}
}

/// No-op manager: every charge succeeds, nothing is tracked.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMemoryManager;

impl MemoryManager for NoopMemoryManager {}
