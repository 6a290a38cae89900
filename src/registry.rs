//! The Registry of all the Thread-Control-Blocks of a single Domain.
//!
//! The Registry is a simple insert-only Linked-List, so Entries are never removed once they were
//! added and it can therefore be traversed by any Thread at any time without further
//! synchronization. Entries are instead marked as free, once the Thread owning them detaches,
//! and are then recycled by the next Thread that attaches.

use std::{alloc, fmt::Debug, marker::PhantomData, ops::Deref, ptr::NonNull};

use crate::{sync::atomic, Error, Result};

const FREE: u8 = 0;
const ATTACHED: u8 = 1;

/// A single Entry in the Registry
pub(crate) struct Entry<T> {
    state: atomic::AtomicU8,
    next: atomic::AtomicPtr<Entry<T>>,
    data: T,
}

impl<T> Entry<T> {
    /// Whether or not the Entry is currently owned by a Thread.
    ///
    /// This is only a Snapshot and the Entry might be claimed or released right after loading it
    pub fn is_attached(&self) -> bool {
        self.state.load(atomic::Ordering::Acquire) == ATTACHED
    }

    /// Attempts to take ownership of the Entry, which only succeeds if it is currently free
    fn try_claim(&self) -> bool {
        self.state
            .compare_exchange(
                FREE,
                ATTACHED,
                atomic::Ordering::AcqRel,
                atomic::Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Gives up the ownership of the Entry, so it can be reused by some other Thread.
    ///
    /// # Safety
    /// The caller must own the Entry and must not access its Thread-Owned parts anymore
    pub unsafe fn release(&self) {
        self.state.store(FREE, atomic::Ordering::Release);
    }
}

impl<T> Deref for Entry<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> Debug for Entry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entry ( attached = {} )", self.is_attached())
    }
}

/// The Result of acquiring an Entry from the Registry
pub(crate) struct Acquired<T> {
    /// The Entry now owned by the current Thread
    pub entry: NonNull<Entry<T>>,
    /// Whether the Entry was newly allocated or recycled
    pub allocated: bool,
}

/// The Insert-Only List of Entries
pub(crate) struct Registry<T> {
    head: atomic::AtomicPtr<Entry<T>>,
    len: atomic::AtomicUsize,
}

// Safety:
// The Registry only hands out shared references to the Entries, and the Entries themselves only
// allow access to their Data through shared references as well. So it can be shared and sent
// across Threads as long as the Data can be
unsafe impl<T> Sync for Registry<T> where T: Send + Sync {}
unsafe impl<T> Send for Registry<T> where T: Send + Sync {}

impl<T> Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Registry ( len = {} )", self.len())
    }
}

impl<T> Registry<T> {
    /// Creates a new empty Registry
    pub fn new() -> Self {
        Self {
            head: atomic::AtomicPtr::new(std::ptr::null_mut()),
            len: atomic::AtomicUsize::new(0),
        }
    }

    /// The Number of Entries that were ever added to the Registry, this number only grows
    pub fn len(&self) -> usize {
        self.len.load(atomic::Ordering::Relaxed)
    }

    /// Claims a free Entry or, if none is available, allocates a new one using the Data
    /// returned by `create` and adds it to the Registry
    pub fn acquire<F>(&self, create: F) -> Result<Acquired<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        for entry in self.iter() {
            if entry.try_claim() {
                tracing::trace!("recycled a thread control block");
                return Ok(Acquired {
                    entry: NonNull::from(entry),
                    allocated: false,
                });
            }
        }

        let n_entry_ptr = allocate(Entry {
            state: atomic::AtomicU8::new(ATTACHED),
            next: atomic::AtomicPtr::new(std::ptr::null_mut()),
            data: create()?,
        })?;
        let n_entry = unsafe { n_entry_ptr.as_ref() };

        let mut head = self.head.load(atomic::Ordering::Acquire);
        loop {
            n_entry.next.store(head, atomic::Ordering::Relaxed);

            match self.head.compare_exchange(
                head,
                n_entry_ptr.as_ptr(),
                atomic::Ordering::AcqRel,
                atomic::Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(other_ptr) => {
                    head = other_ptr;
                }
            };
        }

        let len = self.len.fetch_add(1, atomic::Ordering::Relaxed) + 1;
        tracing::debug!(registered = len, "allocated a new thread control block");

        Ok(Acquired {
            entry: n_entry_ptr,
            allocated: true,
        })
    }

    /// Iterates over all the Entries in the Registry, regardless of their state
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            current: self.head.load(atomic::Ordering::Acquire),
            _marker: PhantomData,
        }
    }

    /// Iterates over all the Entries that are currently owned by some Thread.
    ///
    /// Entries being claimed or released concurrently may or may not be yielded, so anything
    /// that has to see every published Hazard or Epoch must walk [`Registry::iter`] instead
    pub fn live(&self) -> impl Iterator<Item = &Entry<T>> + '_ {
        self.iter().filter(|entry| entry.is_attached())
    }

    /// Temporarily claims every free Entry for which `wants` returns true and calls `take` with
    /// it, while it is owned by the current Thread.
    ///
    /// Entries that are claimed by other Threads in the meantime are simply skipped
    pub fn adopt<P, F>(&self, mut wants: P, mut take: F)
    where
        P: FnMut(&T) -> bool,
        F: FnMut(&T),
    {
        for entry in self.iter() {
            if entry.state.load(atomic::Ordering::Relaxed) != FREE || !wants(&entry.data) {
                continue;
            }

            if entry.try_claim() {
                take(&entry.data);
                unsafe { entry.release() };
            }
        }
    }
}

impl<T> Drop for Registry<T> {
    fn drop(&mut self) {
        let mut current = self.head.load(atomic::Ordering::Acquire);
        while !current.is_null() {
            let entry = unsafe { Box::from_raw(current) };
            current = entry.next.load(atomic::Ordering::Acquire);
        }
    }
}

/// Allocates the Entry, but reports a failed Allocation instead of aborting the Process
fn allocate<T>(entry: Entry<T>) -> Result<NonNull<Entry<T>>> {
    let layout = alloc::Layout::new::<Entry<T>>();

    // Safety:
    // The Layout is never zero sized, as every Entry at least contains its State
    let raw = unsafe { alloc::alloc(layout) } as *mut Entry<T>;
    let ptr = NonNull::new(raw).ok_or(Error::AllocationFailed {
        size: layout.size(),
    })?;

    // Safety:
    // The Memory was just allocated for exactly this Type and is therefore valid for writes.
    // The Memory is later freed using `Box::from_raw`, which uses the same Allocator and Layout
    unsafe { ptr.as_ptr().write(entry) };

    Ok(ptr)
}

/// Iterator over the Entries of a Registry
pub(crate) struct Iter<'r, T> {
    current: *const Entry<T>,
    _marker: PhantomData<&'r Entry<T>>,
}

impl<'r, T> Iterator for Iter<'r, T> {
    type Item = &'r Entry<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_null() {
            return None;
        }

        // Safety:
        // Entries are only ever freed when the Registry itself is dropped, which can not happen
        // while this Iterator borrows it
        let entry = unsafe { &*self.current };
        self.current = entry.next.load(atomic::Ordering::Acquire);

        Some(entry)
    }
}
