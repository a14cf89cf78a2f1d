use crate::domain::events::DecodeError;
use crate::ports::{EncodeError, GatewayError};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stages, in the order one event passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decode,
    Workspace,
    Encode,
    Discover,
    Synthesize,
    Serialize,
    ReadBack,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Decode => "decode",
            Stage::Workspace => "workspace",
            Stage::Encode => "encode",
            Stage::Discover => "discover",
            Stage::Synthesize => "synthesize",
            Stage::Serialize => "serialize",
            Stage::ReadBack => "read_back",
            Stage::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Why one event did not make it to a published result.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("workspace {} is unusable: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("failed to write or read manifest {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode outbound result: {0}")]
    OutboundEncoding(#[source] serde_json::Error),

    #[error(transparent)]
    Publish(#[from] GatewayError),

    #[error("cancelled before {stage} completed")]
    Cancelled { stage: Stage },
}
