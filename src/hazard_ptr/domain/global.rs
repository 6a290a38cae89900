use std::fmt::Debug;

use crate::{
    hazard_ptr::record::Record,
    reclaim::Counters,
    registry::{Acquired, Entry, Registry},
    retired::RetiredList,
    sync::atomic,
    Config, Result,
};

/// This represents the Global shared state for a single Hazard-Domain, which is mainly the
/// Registry of all the Thread-Records in the current Domain
pub(crate) struct DomainGlobal {
    config: Config,
    records: Registry<Record>,
    counters: Counters,
}

impl Debug for DomainGlobal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Domain-Global ( records = {}, live = {}, config = {:?} )",
            self.records.len(),
            self.records.live().count(),
            self.config
        )
    }
}

impl DomainGlobal {
    /// Creates a new Empty DomainGlobal instance, which has no Records to start with
    pub fn new(config: Config) -> Self {
        Self {
            config,
            records: Registry::new(),
            counters: Counters::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Obtains a Record for the current Thread, either by reusing a free one or by
    /// allocating a new one
    pub fn acquire_record(&self) -> Result<Acquired<Record>> {
        let acquired = self
            .records
            .acquire(|| Record::try_new(&self.config))?;
        self.counters.attached(acquired.allocated);

        Ok(acquired)
    }

    /// Gives up the Record of the current Thread, everything still stored in its RetiredList is
    /// left behind for other Threads to adopt
    ///
    /// # Safety
    /// The current Thread must own the Record and must not use it anymore afterwards
    pub unsafe fn release_record(&self, entry: &Entry<Record>) {
        entry.reset();
        let orphaned = unsafe { entry.orphan() };
        if orphaned > 0 {
            tracing::debug!(orphaned, "detached with retired nodes that are still protected");
        }

        unsafe { entry.release() };
        self.counters.detached();
    }

    /// The Number of retired Ptrs a Thread can collect before it starts a Scan.
    ///
    /// This is at least twice the Number of Hazard-Pointers in the Domain, so that every Scan
    /// can reclaim at least half of the Ptrs it looks at
    pub fn scan_threshold(&self) -> usize {
        let hazards = self.records.len() * self.config.hazards_per_thread();
        self.config.scan_threshold().max(2 * hazards)
    }

    /// Checks all the current Hazard-Pointers and stores the Ptrs protected by them in the given
    /// Vec, which is sorted and deduplicated afterwards.
    ///
    /// Every Record is checked, even the ones that look free, as a Thread may have just claimed
    /// one and already published a Hazard-Pointer in it. Free Records only hold Null-Ptrs.
    pub fn get_protections(&self, plist: &mut Vec<*mut ()>) {
        // Pairs with the SeqCst store+load in `Guard::protect`. The caller unlinked the Ptrs it
        // is about to check before this point, so either the Reader's validating load sees the
        // unlink and retries, or the loads below see its Hazard-Pointer. The unlink itself may
        // be any RMW or store, the Fence is what orders it before the loads.
        atomic::fence(atomic::Ordering::SeqCst);

        plist.clear();
        for entry in self.records.iter() {
            plist.extend(entry.protected());
        }

        plist.sort_unstable();
        plist.dedup();
    }

    /// Takes over all the retired Ptrs left behind by detached Threads and moves them into
    /// the given List. Returns the Number of adopted Ptrs
    pub fn adopt_orphans(&self, into: &mut RetiredList) -> usize {
        let mut adopted = 0;
        self.records.adopt(
            |record| record.orphaned() > 0,
            |record| {
                // Safety:
                // The Registry only calls this while the Record is claimed by this Thread
                let orphans = unsafe { record.adopt() };
                adopted += orphans.len();
                into.merge(orphans);
            },
        );

        adopted
    }
}

impl Drop for DomainGlobal {
    fn drop(&mut self) {
        // No Thread can be attached anymore, because every Handle keeps the Global alive, so all
        // the remaining retired Ptrs can be reclaimed
        let mut remaining = 0;
        for entry in self.records.iter() {
            remaining += unsafe { entry.retired().reclaim(|_, _| true) };
        }
        self.counters.freed(remaining);

        tracing::debug!(remaining, "dropped hazard domain");
    }
}
