//! # chatrelay_core
//!
//! Core domain logic for chatrelay: the origin access policy, the inbound and
//! upstream message model, and the incremental frame decoder that re-frames
//! the upstream event stream.

pub mod event;
pub mod frame;
pub mod guard;
pub mod message;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
