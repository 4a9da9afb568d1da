//! Shared library for the exchange-rate cache service.
//!
//! Modules are gated by Cargo features named after their folders, so the
//! binary and the tests only pull in the stacks they use.

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "connections")]
pub mod connections;

#[cfg(feature = "loggers")]
pub mod loggers;

#[cfg(feature = "gateway")]
pub mod gateway;
