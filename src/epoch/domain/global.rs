use std::fmt::Debug;

use crossbeam_utils::CachePadded;

use crate::{
    epoch::record::{Record, INACTIVE},
    reclaim::Counters,
    registry::{Acquired, Entry, Registry},
    retired::RetiredList,
    sync::atomic,
    Config, Result,
};

/// The Global shared state of a single Epoch-Domain
pub(crate) struct DomainGlobal {
    config: Config,
    epoch: CachePadded<atomic::AtomicU64>,
    records: Registry<Record>,
    counters: Counters,
}

impl Debug for DomainGlobal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Domain-Global ( epoch = {}, records = {}, live = {} )",
            self.current_epoch(),
            self.records.len(),
            self.records.live().count()
        )
    }
}

impl DomainGlobal {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            epoch: CachePadded::new(atomic::AtomicU64::new(0)),
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

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(atomic::Ordering::SeqCst)
    }

    /// Moves the Global-Epoch forward, so that Threads pinning from now on are guaranteed to
    /// be in a newer Epoch than every Ptr retired so far
    pub fn advance(&self) -> u64 {
        self.epoch.fetch_add(1, atomic::Ordering::SeqCst) + 1
    }

    /// The oldest Epoch any Thread is currently pinned in, or [`INACTIVE`] if no Thread is
    /// pinned right now.
    ///
    /// Free Records are checked as well, they are always [`INACTIVE`] and a Thread that just
    /// claimed one may already be pinned.
    pub fn oldest_pinned(&self) -> u64 {
        atomic::fence(atomic::Ordering::SeqCst);

        self.records
            .iter()
            .map(|record| record.epoch())
            .min()
            .unwrap_or(INACTIVE)
    }

    pub fn acquire_record(&self) -> Result<Acquired<Record>> {
        let acquired = self
            .records
            .acquire(|| Record::try_new(&self.config))?;
        self.counters.attached(acquired.allocated);

        Ok(acquired)
    }

    /// # Safety
    /// The current Thread must own the Record and must not use it anymore afterwards
    pub unsafe fn release_record(&self, entry: &Entry<Record>) {
        entry.unpin();
        let orphaned = unsafe { entry.orphan() };
        if orphaned > 0 {
            tracing::debug!(orphaned, "detached with retired nodes of a pinned epoch");
        }

        unsafe { entry.release() };
        self.counters.detached();
    }

    pub fn adopt_orphans(&self, into: &mut RetiredList<u64>) -> usize {
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
        let mut remaining = 0;
        for entry in self.records.iter() {
            remaining += unsafe { entry.retired().reclaim(|_, _| true) };
        }
        self.counters.freed(remaining);

        tracing::debug!(remaining, "dropped epoch domain");
    }
}
