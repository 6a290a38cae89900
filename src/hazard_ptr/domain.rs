mod global;
pub(crate) use global::DomainGlobal;

use std::{
    cell::Cell,
    fmt::Debug,
    marker::PhantomData,
    ptr::NonNull,
    sync::Arc,
};

use crate::{
    reclaim::{Disposer, LocalReclaim},
    registry::Entry,
    retired::RetireNode,
    Result,
};

use super::{record::Record, Domain, Guard};

/// The Handle of a single Thread attached to a Hazard-Domain.
///
/// The Handle owns one of the Thread-Records of the Domain for as long as it exists and is
/// therefore bound to the Thread that created it. Dropping the Handle detaches the Thread again
/// and makes the Record available to other Threads.
pub struct LocalHandle {
    global: Arc<DomainGlobal>,
    entry: NonNull<Entry<Record>>,
    /// Bitmask of the Hazard-Pointers currently used by a Guard
    in_use: Cell<u64>,
    /// Reused between Scans to avoid allocating a new List every time
    plist: Cell<Vec<*mut ()>>,
    _not_send: PhantomData<*mut ()>,
}

impl Debug for LocalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LocalHandle ( hazards = {}, guards = {} )",
            self.record().capacity(),
            self.in_use.get().count_ones()
        )
    }
}

impl LocalHandle {
    pub(crate) fn attach(global: Arc<DomainGlobal>) -> Result<Self> {
        let acquired = global.acquire_record()?;
        tracing::trace!(allocated = acquired.allocated, "attached thread to hazard domain");

        Ok(Self {
            global,
            entry: acquired.entry,
            in_use: Cell::new(0),
            plist: Cell::new(Vec::new()),
            _not_send: PhantomData,
        })
    }

    pub(crate) fn record(&self) -> &Record {
        // Safety:
        // The Entry is owned by the Registry of the Global, which is kept alive by this Handle
        unsafe { self.entry.as_ref() }
    }

    pub(crate) fn global(&self) -> &Arc<DomainGlobal> {
        &self.global
    }

    /// The Domain this Handle is attached to
    pub fn domain(&self) -> Domain {
        Domain::from_global(self.global.clone())
    }

    /// The Number of Guards that the current Thread can hold at the same time
    pub fn capacity(&self) -> usize {
        self.record().capacity()
    }

    /// Creates a new empty Guard, that can then be used to protect any sort of Data behind an
    /// AtomicPtr.
    ///
    /// # Panics
    /// If the Thread already holds as many Guards as it has Hazard-Pointers, as this indicates
    /// that the Datastructure needs more Hazard-Pointers than the Domain was configured for
    pub fn guard(&self) -> Guard<'_> {
        let in_use = self.in_use.get();
        let available = !in_use & full_mask(self.capacity());
        assert!(
            available != 0,
            "resource exhausted: all {} hazard pointers of this thread are in use",
            self.capacity()
        );

        let index = available.trailing_zeros() as usize;
        self.in_use.set(in_use | (1 << index));

        Guard::new(self, index)
    }

    /// Marks the Hazard-Pointer as no longer being used by a Guard
    pub(crate) fn release_hazard(&self, index: usize) {
        self.in_use.set(self.in_use.get() & !(1 << index));
    }

    /// Marks the given Ptr as retired and once no more Hazard-Ptrs protect the same Ptr, the
    /// given Disposer will be called to properly clean up the Data.
    ///
    /// This does not provide any guarantee about when the Data will be reclaimed, as there is no
    /// way to predict when the Memory will not be used anymore. However once the Number of
    /// retired Ptrs of this Thread crosses the Scan-Threshold of the Domain, a Scan is
    /// performed automatically.
    ///
    /// # Safety
    /// * The Ptr must not be reachable from the shared Datastructure anymore
    /// * Every Ptr must only be retired once, retiring a Ptr again before it was disposed panics
    ///   in debug builds
    pub unsafe fn retire<T, D>(&self, ptr: *mut T, disposer: D)
    where
        D: Disposer<T>,
    {
        // Safety:
        // This Handle owns the Record and the Reference is dropped before anything else is done
        let r_list = unsafe { self.record().retired() };
        debug_assert!(
            !r_list.contains(ptr as *mut ()),
            "protocol violation: {:p} was retired twice",
            ptr
        );

        r_list.push((), RetireNode::new(ptr, disposer));
        let r_count = r_list.len();
        self.global.counters().retired();

        // If the number of Backed up retirement Nodes is larger than the Boundary, actually
        // reclaim all the Nodes that are not protected anymore
        if r_count >= self.global.scan_threshold() {
            self.scan();
        }
    }

    /// Forces a reclamation cycle and returns the Number of Ptrs that were actually disposed,
    /// which might be none as they might all still be protected.
    ///
    /// # Usage
    /// This function does not need to be called, as the reclamation will be performed
    /// automatically once a certain number of Ptrs are waiting to be reclaimed. However calling
    /// it at a time where you can spare the Cost of reclamation can help to keep it out of the
    /// Hot-Path of your Program
    pub fn scan(&self) -> usize {
        let record = self.record();

        // The Nodes are taken out of the Record, because a Disposer might retire more Nodes while
        // it runs, which then end up in the (now empty) List of the Record
        let mut r_list = unsafe { record.retired() }.take();
        let adopted = self.global.adopt_orphans(&mut r_list);

        let mut plist = self.plist.take();
        self.global.get_protections(&mut plist);

        // Safety:
        // Every Ptr in the List was unlinked before it was retired, so any Thread that still
        // accesses it must have protected it before we loaded the Hazard-Pointers
        let freed = unsafe { r_list.reclaim(|_, ptr| plist.binary_search(&ptr).is_err()) };
        let kept = r_list.len();

        unsafe { record.retired() }.merge(r_list);
        self.global.counters().scanned(freed);

        tracing::trace!(
            freed,
            kept,
            adopted,
            hazards = plist.len(),
            "hazard domain scan"
        );
        self.plist.set(plist);

        freed
    }

    /// Detaches the current Thread from the Domain, this is the same as simply dropping the
    /// Handle
    pub fn detach(self) {
        drop(self);
    }
}

impl Drop for LocalHandle {
    fn drop(&mut self) {
        debug_assert!(
            self.in_use.get() == 0 || std::thread::panicking(),
            "protocol violation: detached while guards are still alive"
        );

        self.scan();

        // Safety:
        // This Handle owns the Entry and is not used anymore afterwards
        unsafe { self.global.release_record(self.entry.as_ref()) };
        tracing::trace!("detached thread from hazard domain");
    }
}

impl LocalReclaim for LocalHandle {
    type Shield<'a> = Guard<'a>;

    fn shield(&self) -> Self::Shield<'_> {
        self.guard()
    }

    unsafe fn retire<T, D>(&self, ptr: *mut T, disposer: D)
    where
        D: Disposer<T>,
    {
        unsafe { LocalHandle::retire(self, ptr, disposer) }
    }

    fn scan(&self) -> usize {
        LocalHandle::scan(self)
    }
}

fn full_mask(capacity: usize) -> u64 {
    if capacity >= 64 {
        u64::MAX
    } else {
        (1 << capacity) - 1
    }
}
