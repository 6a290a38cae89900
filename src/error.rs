//! The Errors that can be returned by the Reclamation-Schemes
//!
//! # Fatal Conditions
//! Misusing one of the Reclamation-Schemes is not reported through this Type, as it indicates a
//! bug in the Datastructure using the Scheme and not some condition the caller could recover
//! from:
//! * Requesting more Guards at the same time than the Thread has Hazard-Slots panics
//! * Retiring the same Ptr twice, before it was reclaimed, panics in debug builds
//! * Detaching a Thread while it still holds Guards is rejected by the Borrow-Checker

use thiserror::Error;

/// The Error-Type for all the fallible Operations of this Crate
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Allocating the Memory for a new Thread-Control-Block failed
    #[error("failed to allocate {size} bytes for a thread control block")]
    AllocationFailed {
        /// The Size of the Allocation that failed
        size: usize,
    },

    /// The provided Configuration can not be used to create a Domain
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The Thread-Local Handle of the current Thread was already destroyed, because the Thread
    /// is currently shutting down
    #[error("the thread local handle is not available anymore, the thread is exiting")]
    ThreadExiting,
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, Error>;
