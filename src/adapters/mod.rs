//! Adapters - Concrete implementations of ports.

pub mod av1an;
pub mod fs;

#[cfg(feature = "kafka")]
pub mod kafka;

#[cfg(feature = "local")]
pub mod local;
