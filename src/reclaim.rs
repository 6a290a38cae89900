//! The Contract shared by all the Reclamation-Schemes of this Crate
//!
//! A Datastructure that wants to be usable with every Scheme is written against the
//! [`Reclaim`], [`LocalReclaim`] and [`Shield`] Traits, instead of a concrete Scheme, and can then
//! be used with either [Hazard-Pointers](crate::hazard_ptr) or [Epochs](crate::epoch) by simply
//! choosing a different Domain when creating it.
//!
//! # Lifecycle of a Node
//! 1. The Node is owned by the shared Datastructure and only accessed through a [`Shield`]
//! 2. The Node is atomically unlinked, so no new Thread can find it anymore
//! 3. The unlinking Thread calls [`LocalReclaim::retire`] and the Node is now owned by the
//!    Reclamation-Scheme
//! 4. Once no [`Shield`] can still reference the Node, its [`Disposer`] is run exactly once

use crate::{sync::atomic, Result};

mod disposer;
pub use disposer::{Disposer, DropBox};

mod stats;
pub(crate) use stats::Counters;
pub use stats::Statistics;

/// A Reclamation-Domain, which is shared by all the Threads accessing the same Datastructures
pub trait Reclaim: Clone + Send + Sync + 'static {
    /// The Per-Thread Handle used to actually interact with the Domain
    type Local: LocalReclaim;

    /// Registers the current Thread with the Domain.
    ///
    /// The returned Handle must be kept around for as long as the Thread wants to access
    /// Datastructures using this Domain and the Thread is detached once it is dropped
    fn attach(&self) -> Result<Self::Local>;

    /// Checks if the given Handle was obtained from this Domain
    fn owns(&self, local: &Self::Local) -> bool;

    /// A Snapshot of the Counters of this Domain
    fn statistics(&self) -> Statistics;
}

/// The Per-Thread part of a Reclamation-Domain
pub trait LocalReclaim {
    /// The Shield that protects Ptrs loaded from shared Memory
    type Shield<'a>: Shield
    where
        Self: 'a;

    /// Acquires a new Shield, which does not protect anything yet
    fn shield(&self) -> Self::Shield<'_>;

    /// Hands the given Ptr over to the Domain, which will call the `disposer` with it once no
    /// Shield protects it anymore.
    ///
    /// # Safety
    /// * The Ptr must have already been unlinked, so no new Thread can load it from the shared
    ///   Datastructure anymore
    /// * Every Ptr must only be retired once
    unsafe fn retire<T, D>(&self, ptr: *mut T, disposer: D)
    where
        D: Disposer<T>;

    /// Forces a reclamation attempt for the Ptrs retired by this Thread and returns the Number of
    /// Ptrs that were actually disposed
    fn scan(&self) -> usize;
}

/// Protects Ptrs, that were loaded from shared Memory, from being reclaimed while the Shield is
/// holding them
pub trait Shield {
    /// Loads the Ptr stored in `source` and makes sure it stays valid for as long as this Shield
    /// is protecting it
    fn protect<T>(&mut self, source: &atomic::AtomicPtr<T>) -> *mut T;

    /// Stops protecting the current Ptr
    fn release(&mut self);
}
