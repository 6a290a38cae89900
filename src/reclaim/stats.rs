use crossbeam_utils::CachePadded;

use crate::sync::atomic;

/// A Snapshot of the Counters of a single Domain.
///
/// The Counters are only meant for Diagnostics and are updated using relaxed Operations, so a
/// Snapshot taken while other Threads are working might not be consistent across Fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Total number of Ptrs that were retired
    pub retired: u64,
    /// Total number of retired Ptrs that were actually disposed
    pub freed: u64,
    /// Number of Scans that were performed
    pub scans: u64,
    /// Number of Threads currently attached to the Domain
    pub attached: u64,
    /// Number of Thread-Control-Blocks ever allocated by the Domain
    pub registered: u64,
}

impl Statistics {
    /// The Number of retired Ptrs that are still waiting to be disposed
    pub fn pending(&self) -> u64 {
        self.retired.saturating_sub(self.freed)
    }
}

#[derive(Debug)]
pub(crate) struct Counters {
    retired: CachePadded<atomic::AtomicU64>,
    freed: CachePadded<atomic::AtomicU64>,
    scans: atomic::AtomicU64,
    attached: atomic::AtomicU64,
    registered: atomic::AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self {
            retired: CachePadded::new(atomic::AtomicU64::new(0)),
            freed: CachePadded::new(atomic::AtomicU64::new(0)),
            scans: atomic::AtomicU64::new(0),
            attached: atomic::AtomicU64::new(0),
            registered: atomic::AtomicU64::new(0),
        }
    }

    pub fn retired(&self) {
        self.retired.fetch_add(1, atomic::Ordering::Relaxed);
    }

    pub fn scanned(&self, freed: usize) {
        self.scans.fetch_add(1, atomic::Ordering::Relaxed);
        self.freed(freed);
    }

    pub fn freed(&self, count: usize) {
        if count > 0 {
            self.freed
                .fetch_add(count as u64, atomic::Ordering::Relaxed);
        }
    }

    pub fn attached(&self, allocated: bool) {
        self.attached.fetch_add(1, atomic::Ordering::Relaxed);
        if allocated {
            self.registered.fetch_add(1, atomic::Ordering::Relaxed);
        }
    }

    pub fn detached(&self) {
        self.attached.fetch_sub(1, atomic::Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Statistics {
        Statistics {
            retired: self.retired.load(atomic::Ordering::Relaxed),
            freed: self.freed.load(atomic::Ordering::Relaxed),
            scans: self.scans.load(atomic::Ordering::Relaxed),
            attached: self.attached.load(atomic::Ordering::Relaxed),
            registered: self.registered.load(atomic::Ordering::Relaxed),
        }
    }
}
