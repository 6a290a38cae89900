use std::{cell::UnsafeCell, fmt::Debug};

use crossbeam_utils::CachePadded;

use crate::{retired::RetiredList, sync::atomic, Config, Result};

/// The Value stored as the Epoch of a Record, whose Thread is currently not pinned
pub(crate) const INACTIVE: u64 = u64::MAX;

/// The Thread-Control-Block of a single Thread in an Epoch-Domain, containing the Epoch the
/// Thread is currently pinned in and the List of Ptrs retired by it, each tagged with the
/// Global-Epoch at the Time it was retired
pub(crate) struct Record {
    epoch: CachePadded<atomic::AtomicU64>,
    retired: UnsafeCell<RetiredList<u64>>,
    orphaned: atomic::AtomicUsize,
}

// Safety:
// The Epoch is atomic and can therefore be read by every Thread. The RetiredList is only ever
// accessed by the Thread that currently owns the Record
unsafe impl Sync for Record {}

impl Record {
    pub fn try_new(config: &Config) -> Result<Self> {
        Ok(Self {
            epoch: CachePadded::new(atomic::AtomicU64::new(INACTIVE)),
            retired: UnsafeCell::new(RetiredList::try_with_capacity(config.scan_threshold())?),
            orphaned: atomic::AtomicUsize::new(0),
        })
    }

    /// The Epoch the owning Thread is pinned in or [`INACTIVE`]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(atomic::Ordering::SeqCst)
    }

    /// Publishes the Epoch the owning Thread is now pinned in. Every load from shared Memory
    /// performed afterwards is ordered after the Publication
    pub fn pin(&self, epoch: u64) {
        self.epoch.store(epoch, atomic::Ordering::SeqCst);
        atomic::fence(atomic::Ordering::SeqCst);
    }

    pub fn unpin(&self) {
        self.epoch.store(INACTIVE, atomic::Ordering::Release);
    }

    /// # Safety
    /// Only the Thread currently owning the Record is allowed to call this and the returned
    /// Reference must not be held while calling any other Function that accesses the List
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn retired(&self) -> &mut RetiredList<u64> {
        unsafe { &mut *self.retired.get() }
    }

    pub fn orphaned(&self) -> usize {
        self.orphaned.load(atomic::Ordering::Relaxed)
    }

    /// # Safety
    /// Only the Thread currently owning the Record is allowed to call this
    pub unsafe fn orphan(&self) -> usize {
        let left = unsafe { self.retired() }.len();
        self.orphaned.store(left, atomic::Ordering::Relaxed);
        left
    }

    /// # Safety
    /// Only the Thread currently owning the Record is allowed to call this
    pub unsafe fn adopt(&self) -> RetiredList<u64> {
        self.orphaned.store(0, atomic::Ordering::Relaxed);
        unsafe { self.retired() }.take()
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record ( epoch = {}, orphaned = {} )",
            self.epoch(),
            self.orphaned()
        )
    }
}
