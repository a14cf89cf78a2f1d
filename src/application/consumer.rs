use super::orchestrator::{Orchestrator, Outcome};
use crate::ports::encoder::Encoder;
use crate::ports::gateway::{EventGateway, GatewayError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Counters reported when the consume loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub published: u64,
    pub publish_failed: u64,
    pub skipped: u64,
    pub cancelled: u64,
}

impl ConsumerStats {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Published { .. } => self.published += 1,
            Outcome::PublishFailed { .. } => self.publish_failed += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Cancelled { .. } => self.cancelled += 1,
        }
    }
}

/// Receive loop: one message is processed to completion before the next one
/// is received.
pub struct Consumer<G, E> {
    orchestrator: Orchestrator<G, E>,
    retry_delay: Duration,
}

impl<G, E> Consumer<G, E>
where
    G: EventGateway,
    E: Encoder,
{
    pub fn new(orchestrator: Orchestrator<G, E>) -> Self {
        Self {
            orchestrator,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Pause after a failed receive before polling again.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator<G, E> {
        &self.orchestrator
    }

    /// Run until `shutdown` is cancelled or the gateway closes.
    pub async fn run(&self, shutdown: CancellationToken) -> ConsumerStats {
        let mut stats = ConsumerStats::default();
        info!(rungs = self.orchestrator.ladder().rungs().len(), "Starting consumer loop");

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping consumer");
                    break;
                }
                received = self.orchestrator.gateway().receive() => received,
            };

            match received {
                Ok(Some(payload)) => {
                    stats.received += 1;
                    let outcome = self.orchestrator.process(&payload, &shutdown).await;
                    stats.record(&outcome);
                    // Cancelled events stay unacknowledged and are redelivered.
                    if !matches!(outcome, Outcome::Cancelled { .. }) {
                        if let Err(e) = self.orchestrator.gateway().ack().await {
                            warn!(error = %e, "Failed to acknowledge message");
                        }
                    }
                }
                Ok(None) => continue,
                Err(GatewayError::Closed) => {
                    info!("Event stream closed, stopping consumer");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to receive message");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        info!(
            received = stats.received,
            published = stats.published,
            publish_failed = stats.publish_failed,
            skipped = stats.skipped,
            cancelled = stats.cancelled,
            "Consumer stopped"
        );
        stats
    }
}
