use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not a video upload event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("video_path is empty")]
    EmptyVideoPath,
    #[error("video_path {0:?} does not name a file")]
    NoFileName(String),
}

/// Upload notification consumed from the inbound topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub video_path: String,
}

impl InboundEvent {
    /// Decode and validate a raw message payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let event: InboundEvent = serde_json::from_slice(payload)?;

        if event.video_path.trim().is_empty() {
            return Err(DecodeError::EmptyVideoPath);
        }
        if Path::new(&event.video_path).file_name().is_none() {
            return Err(DecodeError::NoFileName(event.video_path));
        }

        Ok(event)
    }

    /// File name of the source video; prefixes every segment name.
    pub fn base_name(&self) -> &str {
        Path::new(&self.video_path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.video_path)
    }

    /// Stable workspace id: redelivery of the same upload maps to the same
    /// directory, different uploads never share one.
    pub fn workspace_id(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, self.video_path.as_bytes())
    }
}

/// Result published to the outbound topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundResult {
    pub original_video: String,
    #[serde(rename = "mpd_content")]
    pub manifest_content: String,
}

impl OutboundResult {
    pub fn to_payload(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}
