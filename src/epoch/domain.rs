mod global;
pub(crate) use global::DomainGlobal;

use std::{cell::Cell, fmt::Debug, marker::PhantomData, ptr::NonNull, sync::Arc};

use crate::{
    reclaim::{Disposer, LocalReclaim},
    registry::Entry,
    retired::RetireNode,
    Result,
};

use super::{record::Record, Domain, Guard};

/// The Handle of a single Thread attached to an Epoch-Domain.
///
/// Dropping the Handle detaches the Thread again and makes its Record available to other
/// Threads.
pub struct LocalHandle {
    global: Arc<DomainGlobal>,
    entry: NonNull<Entry<Record>>,
    /// How many Guards of this Thread currently exist
    pins: Cell<usize>,
    /// The Length of the RetiredList at which the next Scan is started
    next_scan: Cell<usize>,
    _not_send: PhantomData<*mut ()>,
}

impl Debug for LocalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalHandle ( pins = {} )", self.pins.get())
    }
}

impl LocalHandle {
    pub(crate) fn attach(global: Arc<DomainGlobal>) -> Result<Self> {
        let acquired = global.acquire_record()?;
        tracing::trace!(allocated = acquired.allocated, "attached thread to epoch domain");

        let next_scan = global.config().scan_threshold();
        Ok(Self {
            global,
            entry: acquired.entry,
            pins: Cell::new(0),
            next_scan: Cell::new(next_scan),
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

    /// Whether the Thread is currently pinned
    pub fn is_pinned(&self) -> bool {
        self.pins.get() > 0
    }

    /// Pins the current Thread in the current Global-Epoch, if it is not already pinned. Every
    /// Ptr loaded while the returned Guard exists can be safely accessed until it is dropped.
    pub fn pin(&self) -> Guard<'_> {
        let pins = self.pins.get();
        if pins == 0 {
            self.record().pin(self.global.current_epoch());
        }
        self.pins.set(pins + 1);

        Guard::new(self)
    }

    pub(crate) fn unpin(&self) {
        let pins = self.pins.get() - 1;
        self.pins.set(pins);
        if pins == 0 {
            self.record().unpin();
        }
    }

    /// Marks the given Ptr as retired in the current Global-Epoch. Once every Thread that was
    /// pinned at that Time unpinned again, the Disposer is called with the Ptr.
    ///
    /// # Safety
    /// * The Ptr must not be reachable from the shared Datastructure anymore
    /// * Every Ptr must only be retired once, retiring a Ptr again before it was disposed panics
    ///   in debug builds
    pub unsafe fn retire<T, D>(&self, ptr: *mut T, disposer: D)
    where
        D: Disposer<T>,
    {
        let epoch = self.global.current_epoch();

        // Safety:
        // This Handle owns the Record and the Reference is dropped before anything else is done
        let r_list = unsafe { self.record().retired() };
        debug_assert!(
            !r_list.contains(ptr as *mut ()),
            "protocol violation: {:p} was retired twice",
            ptr
        );

        r_list.push(epoch, RetireNode::new(ptr, disposer));
        let r_count = r_list.len();
        self.global.counters().retired();

        if r_count >= self.next_scan.get() {
            self.scan();
        }
    }

    /// Advances the Global-Epoch and reclaims every Ptr retired by this Thread, or left behind
    /// by detached Threads, in an Epoch older than the one of every pinned Thread. Returns the
    /// Number of reclaimed Ptrs
    pub fn scan(&self) -> usize {
        let record = self.record();

        let mut r_list = unsafe { record.retired() }.take();
        let adopted = self.global.adopt_orphans(&mut r_list);

        let epoch = self.global.advance();
        let oldest = self.global.oldest_pinned();

        // Safety:
        // Every Thread that could still access one of the Ptrs was pinned before the Ptr was
        // unlinked and is therefore pinned in an Epoch no newer than the one of the Ptr
        let freed = unsafe { r_list.reclaim(|retired_in, _| *retired_in < oldest) };
        let kept = r_list.len();

        unsafe { record.retired() }.merge(r_list);
        self.global.counters().scanned(freed);

        // The next Scan waits until the pending Ptrs doubled, so a stalled Thread cannot force a
        // Scan for every retired Ptr
        let pending = unsafe { record.retired() }.len();
        self.next_scan
            .set(self.global.config().scan_threshold().max(2 * pending));

        tracing::trace!(freed, kept, adopted, epoch, oldest, "epoch domain scan");

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
            self.pins.get() == 0 || std::thread::panicking(),
            "protocol violation: detached while guards are still alive"
        );

        self.scan();

        unsafe { self.global.release_record(self.entry.as_ref()) };
        tracing::trace!("detached thread from epoch domain");
    }
}

impl LocalReclaim for LocalHandle {
    type Shield<'a> = Guard<'a>;

    fn shield(&self) -> Self::Shield<'_> {
        self.pin()
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

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    use crate::{epoch::record::INACTIVE, reclaim::DropBox, Config};

    fn domain(threshold: usize) -> Domain {
        Domain::with_config(Config::default().with_scan_threshold(threshold)).unwrap()
    }

    #[test]
    fn nested_pins() {
        let domain = domain(16);
        let handle = domain.attach().unwrap();
        assert_eq!(INACTIVE, handle.record().epoch());

        let outer = handle.pin();
        let epoch = outer.epoch();
        assert_ne!(INACTIVE, epoch);

        let inner = handle.pin();
        assert_eq!(epoch, inner.epoch());
        drop(outer);
        assert!(handle.is_pinned());
        assert_eq!(epoch, handle.record().epoch());

        drop(inner);
        assert!(!handle.is_pinned());
        assert_eq!(INACTIVE, handle.record().epoch());
    }

    #[test]
    fn pinned_thread_blocks_reclamation() {
        let domain = domain(16);
        let reader = domain.attach().unwrap();
        let writer = domain.attach().unwrap();

        let guard = reader.pin();
        unsafe { writer.retire(Box::into_raw(Box::new(1u32)), DropBox) };
        assert_eq!(0, writer.scan());

        drop(guard);
        assert_eq!(1, writer.scan());
    }

    #[test]
    fn repinned_reader_does_not_block() {
        let domain = domain(16);
        let reader = domain.attach().unwrap();
        let writer = domain.attach().unwrap();

        let guard = reader.pin();
        unsafe { writer.retire(Box::into_raw(Box::new(1u32)), DropBox) };
        assert_eq!(0, writer.scan());
        drop(guard);

        // The Scan advanced the Epoch, so the Reader is now pinned in a newer Epoch than the
        // one the Ptr was retired in
        let guard = reader.pin();
        assert!(guard.epoch() > 0);
        assert_eq!(1, writer.scan());
        assert_eq!(0, domain.statistics().pending());
    }

    #[test]
    fn retire_triggers_scan() {
        let domain = domain(2);
        let handle = domain.attach().unwrap();

        unsafe { handle.retire(Box::into_raw(Box::new(1u32)), DropBox) };
        unsafe { handle.retire(Box::into_raw(Box::new(2u32)), DropBox) };

        let stats = domain.statistics();
        assert_eq!(1, stats.scans);
        assert_eq!(2, stats.freed);
    }

    #[test]
    fn stalled_reader_does_not_force_scan_per_retire() {
        let domain = domain(8);
        let reader = domain.attach().unwrap();
        let writer = domain.attach().unwrap();

        let guard = reader.pin();
        for i in 0..2000u32 {
            unsafe { writer.retire(Box::into_raw(Box::new(i)), DropBox) };
        }

        // Scans at 8, 16, 32, ..., 1024 pending Ptrs
        let stats = domain.statistics();
        assert_eq!(8, stats.scans);
        assert_eq!(0, stats.freed);
        assert_eq!(2000, stats.pending());

        drop(guard);
        assert_eq!(2000, writer.scan());
        assert_eq!(0, domain.statistics().pending());
    }

    #[test]
    fn scan_checks_records_that_look_free() {
        let domain = domain(16);
        let writer = domain.attach().unwrap();
        let reader = domain.attach().unwrap();
        let guard = reader.pin();

        // A Scan can observe the State of a Record from before its Thread claimed it
        unsafe { reader.entry.as_ref().release() };

        unsafe { writer.retire(Box::into_raw(Box::new(1u32)), DropBox) };
        assert_eq!(0, writer.scan());

        drop(guard);
        assert_eq!(1, writer.scan());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "retired twice")]
    fn double_retire() {
        let domain = domain(16);
        let handle = domain.attach().unwrap();

        let ptr = Box::into_raw(Box::new(0u8));
        unsafe { handle.retire(ptr, DropBox) };
        unsafe { handle.retire(ptr, DropBox) };
    }
}
