//! An implementation of Hazard-Pointers, that also supports having multiple
//! Hazard-Pointer-Domains
//!
//! # How it works
//! Every Thread attached to a Domain owns a small, fixed Number of Hazard-Pointers. Before a
//! Thread dereferences a Ptr loaded from a shared Datastructure it publishes the Ptr in one of
//! its Hazard-Pointers using a [`Guard`]. Ptrs that were unlinked from the Datastructure are
//! retired into a Thread-Local List and once that List grows large enough, the Thread scans the
//! Hazard-Pointers of all the attached Threads and reclaims every retired Ptr that is not
//! protected by any of them.
//!
//! # Example
//! ```rust
//! # use std::sync::atomic::{AtomicPtr, Ordering};
//! use lfcds::{hazard_ptr::Domain, reclaim::DropBox};
//!
//! let domain = Domain::new();
//! let handle = domain.attach().unwrap();
//!
//! let shared = AtomicPtr::new(Box::into_raw(Box::new(13u64)));
//!
//! let mut guard = handle.guard();
//! let ptr = guard.protect(&shared);
//! assert_eq!(13, unsafe { *ptr });
//!
//! // Unlink the Ptr and retire it, it will not be reclaimed while the Guard protects it
//! let old = shared.swap(std::ptr::null_mut(), Ordering::SeqCst);
//! unsafe { handle.retire(old, DropBox) };
//! assert_eq!(0, handle.scan());
//!
//! drop(guard);
//! assert_eq!(1, handle.scan());
//! ```
//!
//! # Reference:
//! * [Hazard Pointers: Safe Memory Reclamation for Lock-Free Objects](https://www.eecg.utoronto.ca/~amza/ece1747h/papers/hazard_pointers.pdf)

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

#[doc(hidden)]
pub use lazy_static::lazy_static as __lazy_static;

/// This macro can be used to generate all the needed parts for a new process-wide
/// Hazard-Pointer Domain.
/// This domain will then be available as a module, with the provided Domain-Name and
/// visibility.
///
/// The generated Module attaches every Thread lazily, the first time it is used, and detaches
/// it again once the Thread exits.
///
/// # Domains:
/// A Hazard-Domain helps to seperate different parts of your system that do not share memory
/// and therefore are not relevant, safety wise, for other parts in the System and seperating
/// the Hazard-Pointers by Domain can then help with Performance, as they only need to check the
/// Hazard-Pointers relevant to their Domain.
///
/// # Example:
/// Creates a new Domain called `demo_domain` and then uses it to protect an AtomicPtr and give
/// save access to it;
///
/// ```rust
/// # use std::sync::atomic;
/// lfcds::create_hazard_domain!(
///     /// The Domain used for the Demo
///     demo_domain
/// );
///
/// let boxed_ptr: *mut u8 = Box::into_raw(Box::new(13));
/// let atomic_ptr = atomic::AtomicPtr::new(boxed_ptr);
///
/// let value = demo_domain::with_handle(|handle| {
///     let mut guard = handle.guard();
///     unsafe { *guard.protect(&atomic_ptr) }
/// })
/// .unwrap();
/// assert_eq!(13, value);
///
/// unsafe { demo_domain::retire(boxed_ptr, lfcds::reclaim::DropBox) }.unwrap();
/// ```
#[macro_export]
macro_rules! create_hazard_domain {
    ($(#[$meta:meta])* $vis:vis $domain_name:ident) => {
        $(#[$meta])*
        $vis mod $domain_name {
            use std::cell::RefCell;

            use $crate::hazard_ptr::{Domain, LocalHandle};

            $crate::hazard_ptr::__lazy_static! {
                static ref DOMAIN: Domain = Domain::new();
            }

            thread_local! {
                static LOCAL: RefCell<Option<LocalHandle>> = RefCell::new(None);
            }

            /// The Domain shared by the whole Process
            pub fn domain() -> &'static Domain {
                &DOMAIN
            }

            /// Calls the given Function with the Handle of the current Thread, attaching the
            /// Thread first if this is its first use of the Domain.
            ///
            /// # Errors
            /// Fails if the Thread could not be attached or if it is already exiting
            pub fn with_handle<F, R>(func: F) -> $crate::Result<R>
            where
                F: FnOnce(&LocalHandle) -> R,
            {
                LOCAL
                    .try_with(|local| {
                        if local.borrow().is_none() {
                            let handle = DOMAIN.attach()?;
                            *local.borrow_mut() = Some(handle);
                        }

                        match local.borrow().as_ref() {
                            Some(handle) => Ok(func(handle)),
                            None => Err($crate::Error::ThreadExiting),
                        }
                    })
                    .map_err(|_| $crate::Error::ThreadExiting)?
            }

            /// This function is used to reclaim a piece of memory, once it is no longer in use
            /// by any other Thread. Once it is determined that the given Address is no longer
            /// used by any other Thread, the provided `disposer` will be called with the given
            /// Address to then properly reclaim the piece of memory.
            ///
            /// # Safety
            /// See [`LocalHandle::retire`]
            pub unsafe fn retire<T, D>(ptr: *mut T, disposer: D) -> $crate::Result<()>
            where
                D: $crate::reclaim::Disposer<T>,
            {
                with_handle(|handle| unsafe { handle.retire(ptr, disposer) })
            }

            /// Forces a reclaimation attempt to be performed and returns the Number of
            /// reclaimed Ptrs. However this does not garantue that any Ptrs are actually
            /// reclaimed as they might all still be protected.
            pub fn reclaim() -> $crate::Result<usize> {
                with_handle(|handle| handle.scan())
            }

            /// Detaches the current Thread from the Domain, before the Thread exits. This is
            /// a no-op if the Thread is not attached or its Handle is currently in use.
            pub fn detach() {
                let handle = LOCAL
                    .try_with(|local| local.try_borrow_mut().ok().and_then(|mut l| l.take()))
                    .ok()
                    .flatten();
                drop(handle);
            }
        }
    };
}

/// A Hazard-Pointer Domain, which is seperate from other Domains. To get a Handle to an existing
/// Domain, simply clone the other instance.
#[derive(Clone)]
pub struct Domain {
    global: Arc<DomainGlobal>,
}

impl Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Domain ( {:?} )", self.global)
    }
}

impl Domain {
    /// Creates a new Domain using the default [`Config`]
    pub fn new() -> Self {
        Self::from_global(Arc::new(DomainGlobal::new(Config::default())))
    }

    /// Creates a new Domain using the given Config
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

    /// Attaches the current Thread to the Domain.
    ///
    /// This reuses the Thread-Record of a Thread that already detached or allocates a new one,
    /// if every Record is currently in use.
    ///
    /// # Errors
    /// If the Memory for a new Record could not be allocated
    pub fn attach(&self) -> Result<LocalHandle> {
        LocalHandle::attach(self.global.clone())
    }

    /// Attaches a temporary Handle and performs a Scan with it, which also adopts all the Ptrs
    /// left behind by detached Threads. Returns the Number of Ptrs that were reclaimed.
    ///
    /// Only the orphaned Ptrs and the ones of the temporary Handle are looked at, Ptrs retired by
    /// Threads that are still attached stay in their Lists until those Threads scan or detach.
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

create_hazard_domain!(
    /// The default process-wide Hazard-Domain
    pub default
);
pub use default::{detach, domain, reclaim, retire, with_handle};
