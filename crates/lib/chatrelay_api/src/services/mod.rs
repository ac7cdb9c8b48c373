//! Upstream client and stream relay.

pub mod relay;
pub mod upstream;
