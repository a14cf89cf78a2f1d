//! Local Worker Binary - reads upload events from stdin, one JSON object per
//! line, and writes one result per line to stdout.
//!
//! Useful for running the pipeline without a broker:
//! `echo '{"video_path":"/tmp/in.mp4"}' | local_worker`

use dashpipe::adapters::local::StdioGateway;
use dashpipe::{signal, telemetry, Consumer, Orchestrator, PipelineConfig};
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

    telemetry::init(config.log_format);

    let ladder = match config.ladder() {
        Ok(ladder) => ladder,
        Err(e) => {
            error!(error = %e, "Failed to load ladder");
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
        StdioGateway::stdio(),
        config.encoder(),
        ladder,
        config.pipeline_settings(),
    );

    let shutdown = CancellationToken::new();
    signal::cancel_on_shutdown(shutdown.clone());

    let stats = Consumer::new(orchestrator).run(shutdown).await;
    info!(?stats, "Local worker stopped");
}
