//! Application layer - Generic services that use ports.

pub mod consumer;
pub mod orchestrator;

pub use consumer::{Consumer, ConsumerStats};
pub use orchestrator::{Orchestrator, Outcome, PipelineSettings};
