use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to receive message: {0}")]
    Receive(String),
    #[error("failed to publish message: {0}")]
    Publish(String),
    #[error("failed to acknowledge message: {0}")]
    Ack(String),
    #[error("event stream closed")]
    Closed,
}

/// Queue consume/produce primitives.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventGateway: Send + Sync {
    /// Wait for the next inbound payload.
    /// `Ok(None)`: the poll returned nothing, try again.
    /// `Err(GatewayError::Closed)`: no more messages will arrive.
    async fn receive(&self) -> Result<Option<Bytes>, GatewayError>;

    /// Publish one payload to the outbound topic.
    async fn publish(&self, payload: Bytes) -> Result<(), GatewayError>;

    /// Mark the last received message as handled. Until then a restarted
    /// consumer receives it again.
    async fn ack(&self) -> Result<(), GatewayError>;
}
