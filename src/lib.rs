#![deny(missing_docs)]
#![warn(rust_2018_idioms, missing_debug_implementations)]
//! This crate provides Safe-Memory-Reclamation for Lock-Free Datastructures and a couple of
//! Datastructures built on top of it
//!
//! # Reclamation-Schemes
//! * [Hazard-Pointers](hazard_ptr): Every Thread protects the individual Ptrs it is accessing
//! * [Epochs](epoch): Every Thread protects everything it accesses while being pinned
//!
//! Both Schemes implement the Traits in [`reclaim`], so Datastructures can be written once and
//! then used with either of them.
//!
//! # Feature-Flags
//! * `hazard_ptr`: Enables the Hazard-Ptr implementation
//! * `epoch`: Enables the Epoch-Based implementation
//! * `containers`: Enables the [`stack`] and [`queue`] Datastructures
//! * `full`: Enables all the Feature-Flags
//! * `demo`: Enables the Demo-Binary

pub mod config;
pub use config::Config;

pub mod error;
pub use error::{Error, Result};

pub mod reclaim;

mod sync;

#[cfg(any(feature = "hazard_ptr", feature = "epoch"))]
mod registry;
#[cfg(any(feature = "hazard_ptr", feature = "epoch"))]
mod retired;

#[cfg(feature = "epoch")]
pub mod epoch;
#[cfg(feature = "hazard_ptr")]
pub mod hazard_ptr;

#[cfg(feature = "containers")]
pub mod queue;
#[cfg(feature = "containers")]
pub mod stack;
