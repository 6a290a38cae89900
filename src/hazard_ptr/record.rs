use std::{cell::UnsafeCell, fmt::Debug};

use crate::{retired::RetiredList, sync::atomic, Config, Error, Result};

/// The Thread-Control-Block of a single Thread in a Hazard-Domain, containing all its
/// Hazard-Pointers and the List of Ptrs retired by it
pub(crate) struct Record {
    /// The Hazard-Pointers of the Thread, if a Hazard-Pointer is currently not in use, it
    /// stores a Null-Ptr
    hazards: Box<[atomic::AtomicPtr<()>]>,
    /// The Ptrs retired by the owning Thread
    retired: UnsafeCell<RetiredList>,
    /// The Number of retired Ptrs left behind by the last Thread that owned this Record
    orphaned: atomic::AtomicUsize,
}

// Safety:
// The Hazard-Pointers are atomic and can therefore be read by every Thread. The RetiredList is
// only ever accessed by the Thread that currently owns the Record, which is guaranteed by the
// Registry only ever handing a Record to a single Thread at a time
unsafe impl Sync for Record {}

impl Record {
    /// Creates a new empty Record, which can be added to the Registry
    pub fn try_new(config: &Config) -> Result<Self> {
        let slots = config.hazards_per_thread();

        let mut hazards = Vec::new();
        hazards
            .try_reserve_exact(slots)
            .map_err(|_| Error::AllocationFailed {
                size: slots * std::mem::size_of::<atomic::AtomicPtr<()>>(),
            })?;
        hazards.extend((0..slots).map(|_| atomic::AtomicPtr::new(std::ptr::null_mut())));

        Ok(Self {
            hazards: hazards.into_boxed_slice(),
            retired: UnsafeCell::new(RetiredList::try_with_capacity(config.scan_threshold())?),
            orphaned: atomic::AtomicUsize::new(0),
        })
    }

    /// The Number of Hazard-Pointers of this Record
    pub fn capacity(&self) -> usize {
        self.hazards.len()
    }

    /// A single Hazard-Pointer of this Record
    pub fn hazard(&self, index: usize) -> &atomic::AtomicPtr<()> {
        &self.hazards[index]
    }

    /// Loads all the Ptrs that are currently protected by this Record
    pub fn protected(&self) -> impl Iterator<Item = *mut ()> + '_ {
        self.hazards
            .iter()
            .map(|hazard| hazard.load(atomic::Ordering::SeqCst))
            .filter(|ptr| !ptr.is_null())
    }

    /// Resets all the Hazard-Pointers to their empty initial State, where they do not protect
    /// any Memory
    pub fn reset(&self) {
        for hazard in self.hazards.iter() {
            hazard.store(std::ptr::null_mut(), atomic::Ordering::Release);
        }
    }

    /// The List of Ptrs retired by the owning Thread
    ///
    /// # Safety
    /// Only the Thread currently owning the Record is allowed to call this and the returned
    /// Reference must not be held while calling any other Function that accesses the List
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn retired(&self) -> &mut RetiredList {
        unsafe { &mut *self.retired.get() }
    }

    /// The Number of Ptrs left behind by the previous Owner
    pub fn orphaned(&self) -> usize {
        self.orphaned.load(atomic::Ordering::Relaxed)
    }

    /// Marks the currently retired Ptrs as left behind, right before giving up the Record
    ///
    /// # Safety
    /// Only the Thread currently owning the Record is allowed to call this
    pub unsafe fn orphan(&self) -> usize {
        let left = unsafe { self.retired() }.len();
        self.orphaned.store(left, atomic::Ordering::Relaxed);
        left
    }

    /// Takes all the Ptrs left behind by the previous Owner
    ///
    /// # Safety
    /// Only the Thread currently owning the Record is allowed to call this
    pub unsafe fn adopt(&self) -> RetiredList {
        self.orphaned.store(0, atomic::Ordering::Relaxed);
        unsafe { self.retired() }.take()
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record ( hazards = {}, orphaned = {} )",
            self.capacity(),
            self.orphaned()
        )
    }
}
