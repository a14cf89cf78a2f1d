//! Dashpipe - Upload-to-DASH Transcoding Pipeline
//!
//! Consumes `{"video_path": ...}` upload events, encodes the video once per
//! rung of a resolution ladder, writes a DASH manifest next to the segments
//! and publishes `{"original_video": ..., "mpd_content": ...}`.
//!
//! Hexagonal Architecture:
//! - domain/: Pure pipeline logic (ladder, segments, events, dash)
//! - ports/: Trait definitions (encoder, event gateway)
//! - adapters/: Concrete implementations (av1an, filesystem, stdio, kafka)
//! - application/: Generic services (orchestrator, consumer loop)
//! - config: Environment configuration
//!
//! # Features
//! - `local`: stdin/stdout JSON-lines gateway and the `local_worker` binary
//! - `kafka`: rdkafka gateway and the `kafka_worker` binary

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod signal;
pub mod telemetry;

// Re-exports for convenience
pub use application::{Consumer, ConsumerStats, Orchestrator, Outcome, PipelineSettings};
pub use config::{ConfigError, LogFormat, PipelineConfig};
pub use domain::dash;
pub use error::{PipelineError, Stage};

#[cfg(feature = "kafka")]
pub use config::KafkaConfig;
