//! # Epoch-Based Reclamation
//! An alternative to [Hazard-Pointers](crate::hazard_ptr) that provides the same Contract, but
//! tracks whole Critical-Sections instead of single Ptrs.
//!
//! # How it works
//! The Domain maintains a Global-Epoch counter. A Thread that wants to access a Datastructure
//! first pins itself, which publishes the current Global-Epoch in its Record, and all the Ptrs
//! it loads stay valid until it unpins again. Retired Ptrs are tagged with the Global-Epoch at
//! the Time they were retired and every Scan advances the Global-Epoch and reclaims all the Ptrs
//! that were retired strictly before the oldest Epoch any Thread is currently pinned in.
//!
//! Compared to Hazard-Pointers, loading a Ptr is a plain atomic Load, but a single Thread that
//! stays pinned for a long Time prevents all Ptrs retired since from being reclaimed.
//!
//! # Example
//! ```rust
//! # use std::sync::atomic::{AtomicPtr, Ordering};
//! use lfcds::{epoch::Domain, reclaim::DropBox};
//!
//! let domain = Domain::new();
//! let handle = domain.attach().unwrap();
//!
//! let shared = AtomicPtr::new(Box::into_raw(Box::new(13u64)));
//!
//! let guard = handle.pin();
//! let ptr = guard.protect(&shared);
//! assert_eq!(13, unsafe { *ptr });
//!
//! let old = shared.swap(std::ptr::null_mut(), Ordering::SeqCst);
//! unsafe { handle.retire(old, DropBox) };
//! assert_eq!(0, handle.scan());
//!
//! drop(guard);
//! assert_eq!(1, handle.scan());
//! ```

use std::{fmt::Debug, sync::Arc};

mod record;

mod domain;
use domain::DomainGlobal;
pub use domain::LocalHandle;

mod guard;
pub use guard::Guard;

use crate::{
    reclaim::{Reclaim, Statistics},
    Config, Result,
};

/// An Epoch-Domain, which is seperate from other Domains. To get a Handle to an existing Domain,
/// simply clone the other instance.
#[derive(Clone)]
pub struct Domain {
    global: Arc<DomainGlobal>,
}

impl Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EpochDomain ( {:?} )", self.global)
    }
}

impl Domain {
    /// Creates a new Domain using the default [`Config`]
    pub fn new() -> Self {
        Self::from_global(Arc::new(DomainGlobal::new(Config::default())))
    }

    /// Creates a new Domain using the given Config, the Number of Hazard-Pointers is ignored
    ///
    /// # Errors
    /// If the Config is not valid
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self::from_global(Arc::new(DomainGlobal::new(config))))
    }

    pub(crate) fn from_global(global: Arc<DomainGlobal>) -> Self {
        Self { global }
    }

    /// The Config used by this Domain
    pub fn config(&self) -> Config {
        *self.global.config()
    }

    /// The current Global-Epoch
    pub fn epoch(&self) -> u64 {
        self.global.current_epoch()
    }

    /// Attaches the current Thread to the Domain
    ///
    /// # Errors
    /// If the Memory for a new Record could not be allocated
    pub fn attach(&self) -> Result<LocalHandle> {
        LocalHandle::attach(self.global.clone())
    }

    /// Attaches a temporary Handle and performs a Scan with it, which also adopts all the Ptrs
    /// left behind by detached Threads. Returns the Number of Ptrs that were reclaimed.
    ///
    /// Ptrs retired by Threads that are still attached are not touched
    pub fn collect(&self) -> Result<usize> {
        let handle = self.attach()?;
        Ok(handle.scan())
    }

    /// A Snapshot of the Counters of this Domain
    pub fn statistics(&self) -> Statistics {
        self.global.counters().snapshot()
    }
}

impl Default for Domain {
    fn default() -> Self {
        Self::new()
    }
}

impl Reclaim for Domain {
    type Local = LocalHandle;

    fn attach(&self) -> Result<Self::Local> {
        Domain::attach(self)
    }

    fn owns(&self, local: &Self::Local) -> bool {
        Arc::ptr_eq(&self.global, local.global())
    }

    fn statistics(&self) -> Statistics {
        Domain::statistics(self)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    use crate::{reclaim::DropBox, sync::atomic};

    #[test]
    fn orphans_are_adopted() {
        let domain = Domain::new();
        let ptr = Box::into_raw(Box::new(5u64));
        let shared = atomic::AtomicPtr::new(ptr);

        let reader = domain.attach().unwrap();
        let guard = reader.pin();
        assert_eq!(ptr, guard.protect(&shared));

        let writer = domain.attach().unwrap();
        shared.store(std::ptr::null_mut(), atomic::Ordering::SeqCst);
        unsafe { writer.retire(ptr, DropBox) };
        writer.detach();
        assert_eq!(1, domain.statistics().pending());

        drop(guard);
        assert_eq!(1, domain.collect().unwrap());
        assert_eq!(0, domain.statistics().pending());
    }

    #[test]
    fn scan_advances_epoch() {
        let domain = Domain::new();
        let handle = domain.attach().unwrap();

        let before = domain.epoch();
        handle.scan();
        assert_eq!(before + 1, domain.epoch());
    }

    #[test]
    fn owns_handle() {
        let domain = Domain::new();
        let other = Domain::new();
        let handle = domain.attach().unwrap();

        assert!(Reclaim::owns(&domain, &handle));
        assert!(!Reclaim::owns(&other, &handle));
    }

    #[test]
    fn statistics() {
        let domain = Domain::new();
        let handle = domain.attach().unwrap();

        unsafe { handle.retire(Box::into_raw(Box::new(0u16)), DropBox) };
        handle.scan();

        let stats = domain.statistics();
        assert_eq!(1, stats.retired);
        assert_eq!(1, stats.freed);
        assert_eq!(1, stats.attached);
        assert_eq!(1, stats.registered);
    }
}
