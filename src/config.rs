//! Configuration loaded from environment variables (and `.env`).

use crate::adapters::av1an::Av1anEncoder;
use crate::application::PipelineSettings;
use crate::domain::dash::{ManifestSettings, TIMESCALE};
use crate::domain::ladder::{Ladder, LadderError};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Longest segment whose SegmentList duration still fits in `u64` units.
const MAX_SEGMENT_DURATION_SECS: u64 = u64::MAX / TIMESCALE;
const SEGMENT_DURATION_EXPECTED: &str = "positive number of seconds";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is not a valid {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Ladder(#[from] LadderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Configuration shared by every worker binary.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Parent directory of the per-video workspaces
    pub workspace_root: PathBuf,
    /// Encoder executable
    pub encoder_bin: PathBuf,
    /// Codec passed to the encoder
    pub encoder_codec: String,
    pub segment_extension: String,
    pub segment_duration_secs: u64,
    pub min_buffer_time: String,
    /// JSON ladder file; the standard ladder when unset
    pub ladder_path: Option<PathBuf>,
    /// BaseURL template for every representation; `{rung}` is substituted
    pub manifest_base_url: Option<String>,
    pub encode_concurrency: usize,
    pub log_format: LogFormat,
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ManifestSettings::default();

        Ok(Self {
            workspace_root: lookup("WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("video_processing")),
            encoder_bin: PathBuf::from(
                lookup("ENCODER_BIN").unwrap_or_else(|| String::from("av1an")),
            ),
            encoder_codec: lookup("ENCODER_CODEC").unwrap_or_else(|| String::from("vp9")),
            segment_extension: lookup("SEGMENT_EXTENSION")
                .unwrap_or_else(|| String::from("webm")),
            segment_duration_secs: parse(
                &lookup,
                "SEGMENT_DURATION_SECS",
                defaults.segment_duration_secs,
                SEGMENT_DURATION_EXPECTED,
            )
            .and_then(|secs: u64| match secs {
                1..=MAX_SEGMENT_DURATION_SECS => Ok(secs),
                _ => Err(ConfigError::Invalid {
                    key: "SEGMENT_DURATION_SECS",
                    value: secs.to_string(),
                    expected: SEGMENT_DURATION_EXPECTED,
                }),
            })?,
            min_buffer_time: lookup("MIN_BUFFER_TIME").unwrap_or(defaults.min_buffer_time),
            ladder_path: non_empty(lookup("LADDER_PATH")).map(PathBuf::from),
            manifest_base_url: non_empty(lookup("MANIFEST_BASE_URL")),
            encode_concurrency: parse(&lookup, "ENCODE_CONCURRENCY", 1, "positive integer")
                .and_then(|n: usize| match n {
                    0 => Err(ConfigError::Invalid {
                        key: "ENCODE_CONCURRENCY",
                        value: n.to_string(),
                        expected: "positive integer",
                    }),
                    n => Ok(n),
                })?,
            log_format: parse(&lookup, "LOG_FORMAT", LogFormat::Text, "log format (text|json)")?,
        })
    }

    /// The ladder file when configured, otherwise the standard ladder.
    pub fn ladder(&self) -> Result<Ladder, ConfigError> {
        match &self.ladder_path {
            Some(path) => Ok(Ladder::from_json_file(path)?),
            None => Ok(Ladder::standard()),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            workspace_root: self.workspace_root.clone(),
            segment_extension: self.segment_extension.clone(),
            encode_concurrency: self.encode_concurrency,
            manifest: ManifestSettings {
                segment_duration_secs: self.segment_duration_secs,
                min_buffer_time: self.min_buffer_time.clone(),
                base_url: self.manifest_base_url.clone(),
                ..ManifestSettings::default()
            },
        }
    }

    pub fn encoder(&self) -> Av1anEncoder {
        Av1anEncoder::new(
            self.encoder_bin.clone(),
            self.encoder_codec.clone(),
            self.segment_extension.clone(),
        )
    }
}

/// Broker settings for the Kafka worker.
#[cfg(feature = "kafka")]
#[derive(Clone, Debug)]
pub struct KafkaConfig {
    pub brokers: String,
    pub group_id: String,
    /// Topic carrying upload events
    pub input_topic: String,
    /// Topic receiving processing results
    pub output_topic: String,
}

#[cfg(feature = "kafka")]
impl KafkaConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            brokers: lookup("KAFKA_BROKERS").unwrap_or_else(|| String::from("localhost:9092")),
            group_id: lookup("KAFKA_GROUP_ID")
                .unwrap_or_else(|| String::from("video-processor")),
            input_topic: lookup("KAFKA_INPUT_TOPIC")
                .unwrap_or_else(|| String::from("video-uploads")),
            output_topic: lookup("KAFKA_OUTPUT_TOPIC")
                .unwrap_or_else(|| String::from("processed-videos")),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse<F, T>(
    lookup: &F,
    key: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value,
            expected,
        }),
    }
}
