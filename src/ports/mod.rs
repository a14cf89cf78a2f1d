//! Ports - Trait definitions for the pipeline's external collaborators.

pub mod encoder;
pub mod gateway;

pub use encoder::{EncodeError, Encoder};
pub use gateway::{EventGateway, GatewayError};
