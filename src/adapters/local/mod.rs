//! Local adapters for running the pipeline without a broker.

pub mod stdio;

pub use stdio::StdioGateway;
