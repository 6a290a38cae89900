use std::fmt::Debug;

use crate::{reclaim::Shield, sync::atomic};

use super::LocalHandle;

/// A Guard keeps the current Thread pinned in an Epoch, which protects every Ptr loaded while
/// the Guard exists from being reclaimed.
///
/// Guards can be nested, in which case the Thread stays pinned until the outermost Guard is
/// dropped.
pub struct Guard<'h> {
    handle: &'h LocalHandle,
}

impl Debug for Guard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Guard ( epoch = {} )", self.epoch())
    }
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        self.handle.unpin();
    }
}

impl<'h> Guard<'h> {
    pub(crate) fn new(handle: &'h LocalHandle) -> Self {
        Self { handle }
    }

    /// The Epoch the Thread is pinned in
    pub fn epoch(&self) -> u64 {
        self.handle.record().epoch()
    }

    /// Loads the Ptr stored in the AtomicPtr, which stays valid until the Guard is dropped
    pub fn protect<T>(&self, atom_ptr: &atomic::AtomicPtr<T>) -> *mut T {
        atom_ptr.load(atomic::Ordering::Acquire)
    }
}

impl Shield for Guard<'_> {
    fn protect<T>(&mut self, source: &atomic::AtomicPtr<T>) -> *mut T {
        Guard::protect(self, source)
    }

    /// The Pin covers every Ptr loaded through the Guard, so single Ptrs can not be released
    fn release(&mut self) {}
}
