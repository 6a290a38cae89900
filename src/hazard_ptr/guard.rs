use std::fmt::Debug;

use crate::{reclaim::Shield, sync::atomic};

use super::LocalHandle;

/// A Guard owns a single Hazard-Pointer of the current Thread and protects the Memory address
/// stored in it from being reclaimed, as long as the Guard is not dropped or reset.
///
/// The Guard borrows the Handle it was created from, so a Thread can never detach from the
/// Domain while it still holds Guards.
pub struct Guard<'h> {
    handle: &'h LocalHandle,
    /// The Index of the Hazard-Pointer owned by this Guard
    index: usize,
}

impl Debug for Guard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Guard ( index = {}, ptr = {:p} )", self.index, self.protected())
    }
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        self.reset();
        self.handle.release_hazard(self.index);
    }
}

impl<'h> Guard<'h> {
    pub(crate) fn new(handle: &'h LocalHandle, index: usize) -> Self {
        Self { handle, index }
    }

    fn hazard(&self) -> &atomic::AtomicPtr<()> {
        self.handle.record().hazard(self.index)
    }

    /// The Index of the Hazard-Pointer used by this Guard
    pub fn index(&self) -> usize {
        self.index
    }

    /// Loads the most recent Ptr-Value from the given AtomicPtr and protects it, replacing
    /// whatever the Guard protected before.
    ///
    /// # Behaviour
    /// The AtomicPtr is read at least 2-times to make sure that the Ptr was not unlinked and
    /// reclaimed before the Hazard-Pointer was published. Only once two consecutive reads agree
    /// is the Ptr returned.
    ///
    /// # Usage
    /// Reusing a single Guard while iterating a Datastructure avoids acquiring a new
    /// Hazard-Pointer for every Node, as you often only need the Node you are currently
    /// processing.
    pub fn protect<T>(&mut self, atom_ptr: &atomic::AtomicPtr<T>) -> *mut T {
        let hazard = self.hazard();

        let mut protect_ptr = atom_ptr.load(atomic::Ordering::SeqCst);
        loop {
            hazard.store(protect_ptr as *mut (), atomic::Ordering::SeqCst);

            let n_ptr = atom_ptr.load(atomic::Ordering::SeqCst);
            if n_ptr == protect_ptr {
                break;
            }

            protect_ptr = n_ptr;
        }

        protect_ptr
    }

    /// Publishes the given Ptr without validating it.
    ///
    /// The caller has to check that the Ptr is still reachable after this call returned, before
    /// it can rely on the Ptr being protected
    pub fn protect_raw<T>(&mut self, ptr: *mut T) {
        self.hazard()
            .store(ptr as *mut (), atomic::Ordering::SeqCst);
    }

    /// The Ptr currently protected by this Guard, which is Null if it protects nothing
    pub fn protected(&self) -> *mut () {
        self.hazard().load(atomic::Ordering::Relaxed)
    }

    /// Clears the Hazard-Pointer, so the previously protected Ptr can be reclaimed
    pub fn reset(&mut self) {
        self.hazard()
            .store(std::ptr::null_mut(), atomic::Ordering::Release);
    }
}

impl Shield for Guard<'_> {
    fn protect<T>(&mut self, source: &atomic::AtomicPtr<T>) -> *mut T {
        Guard::protect(self, source)
    }

    fn release(&mut self) {
        self.reset();
    }
}
