//! Kafka Worker Binary - consumes upload events from the input topic and
//! publishes manifests to the output topic.

use dashpipe::adapters::kafka::KafkaGateway;
use dashpipe::{signal, telemetry, Consumer, KafkaConfig, Orchestrator, PipelineConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let kafka_config = KafkaConfig::from_env();

    telemetry::init(config.log_format);

    let ladder = match config.ladder() {
        Ok(ladder) => ladder,
        Err(e) => {
            error!(error = %e, "Failed to load ladder");
            std::process::exit(1);
        }
    };

    let gateway = match KafkaGateway::new(&kafka_config) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!(error = %e, "Failed to connect to Kafka");
            std::process::exit(1);
        }
    };

    info!(
        workspace_root = %config.workspace_root.display(),
        encoder = %config.encoder_bin.display(),
        rungs = ladder.rungs().len(),
        "Configuration loaded"
    );

    let orchestrator = Orchestrator::new(
        gateway,
        config.encoder(),
        ladder,
        config.pipeline_settings(),
    );

    let shutdown = CancellationToken::new();
    signal::cancel_on_shutdown(shutdown.clone());

    let stats = Consumer::new(orchestrator).run(shutdown).await;
    info!(?stats, "Kafka worker stopped");
}
