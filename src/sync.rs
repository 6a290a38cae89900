//! Switches the atomics used by the Crate to the ones from [loom](https://docs.rs/loom) when
//! running the model checker, so that the concurrent parts can be explored exhaustively

#[cfg(loom)]
pub(crate) use loom::sync::atomic;

#[cfg(not(loom))]
pub(crate) use std::sync::atomic;
