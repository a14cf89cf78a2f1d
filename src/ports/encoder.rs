use crate::domain::ladder::ResolutionRung;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to launch encoder {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for encoder on rung {rung}: {source}")]
    Wait {
        rung: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encoder failed for rung {rung} ({status}): {stderr}")]
    Failed {
        rung: String,
        status: String,
        stderr: String,
    },
    #[error("failed to list segments for rung {rung}: {source}")]
    Scan {
        rung: String,
        #[source]
        source: std::io::Error,
    },
}

/// Encodes one source video at one rung into segment files inside the
/// workspace.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Returns the file names of the segments produced for `rung`.
    async fn encode(
        &self,
        video_path: &Path,
        workspace: &Path,
        rung: &ResolutionRung,
    ) -> Result<Vec<String>, EncodeError>;
}
