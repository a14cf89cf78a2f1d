use crate::adapters::fs::Workspace;
use crate::domain::dash::{synthesize, ManifestSettings};
use crate::domain::events::{InboundEvent, OutboundResult};
use crate::domain::ladder::Ladder;
use crate::error::{PipelineError, Stage};
use crate::ports::encoder::{EncodeError, Encoder};
use crate::ports::gateway::EventGateway;
use futures::{stream, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Runtime knobs of the pipeline that are not part of the ladder.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Parent directory of every per-video workspace
    pub workspace_root: PathBuf,
    /// Extension of the segment files produced by the encoder
    pub segment_extension: String,
    /// Rungs encoded at the same time; 1 means strictly sequential
    pub encode_concurrency: usize,
    pub manifest: ManifestSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("video_processing"),
            segment_extension: "webm".to_string(),
            encode_concurrency: 1,
            manifest: ManifestSettings::default(),
        }
    }
}

/// How one inbound message was handled.
#[derive(Debug)]
pub enum Outcome {
    Published {
        video_path: String,
        manifest_path: PathBuf,
    },
    /// The manifest was produced but the result could not be delivered.
    PublishFailed {
        video_path: String,
        manifest_path: PathBuf,
        error: PipelineError,
    },
    Skipped {
        stage: Stage,
        error: PipelineError,
    },
    Cancelled {
        stage: Stage,
    },
}

impl Outcome {
    /// Whether the event went all the way through publish, successfully or not.
    pub fn is_processed(&self) -> bool {
        matches!(
            self,
            Outcome::Published { .. } | Outcome::PublishFailed { .. }
        )
    }
}

struct Failure {
    stage: Stage,
    error: PipelineError,
}

impl Failure {
    fn new(stage: Stage, error: impl Into<PipelineError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

fn checkpoint(cancel: &CancellationToken, stage: Stage) -> Result<(), Failure> {
    if cancel.is_cancelled() {
        return Err(Failure::new(stage, PipelineError::Cancelled { stage }));
    }
    Ok(())
}

/// Drives one event through encode, manifest synthesis and publish.
pub struct Orchestrator<G, E> {
    gateway: G,
    encoder: E,
    ladder: Ladder,
    settings: PipelineSettings,
}

impl<G, E> Orchestrator<G, E>
where
    G: EventGateway,
    E: Encoder,
{
    pub fn new(gateway: G, encoder: E, ladder: Ladder, settings: PipelineSettings) -> Self {
        Self {
            gateway,
            encoder,
            ladder,
            settings,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn ladder(&self) -> &Ladder {
        &self.ladder
    }

    /// Process one raw message. Never fails: every error ends up in the
    /// returned [`Outcome`].
    pub async fn process(&self, payload: &[u8], cancel: &CancellationToken) -> Outcome {
        if cancel.is_cancelled() {
            return Outcome::Cancelled {
                stage: Stage::Decode,
            };
        }

        let event = match InboundEvent::decode(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(stage = %Stage::Decode, error = %e, "Skipping undecodable message");
                return Outcome::Skipped {
                    stage: Stage::Decode,
                    error: e.into(),
                };
            }
        };

        let span = info_span!("event", video_path = %event.video_path);
        self.process_event(event, cancel).instrument(span).await
    }

    async fn process_event(&self, event: InboundEvent, cancel: &CancellationToken) -> Outcome {
        info!(stage = %Stage::Decode, "Event received");

        let (manifest_path, manifest_content) = match self.produce_manifest(&event, cancel).await
        {
            Ok(produced) => produced,
            Err(Failure {
                error: PipelineError::Cancelled { stage },
                ..
            }) => {
                warn!(stage = %stage, "Processing cancelled");
                return Outcome::Cancelled { stage };
            }
            Err(Failure { stage, error }) => {
                error!(stage = %stage, error = %error, "Processing failed, skipping event");
                return Outcome::Skipped { stage, error };
            }
        };

        if cancel.is_cancelled() {
            warn!(stage = %Stage::Publish, "Processing cancelled");
            return Outcome::Cancelled {
                stage: Stage::Publish,
            };
        }

        let result = OutboundResult {
            original_video: event.video_path.clone(),
            manifest_content,
        };
        let delivered = match result.to_payload() {
            Ok(payload) => self.gateway.publish(payload).await.map_err(PipelineError::from),
            Err(e) => Err(PipelineError::OutboundEncoding(e)),
        };

        match delivered {
            Ok(()) => {
                info!(stage = %Stage::Publish, manifest = %manifest_path.display(), "Result published");
                Outcome::Published {
                    video_path: event.video_path,
                    manifest_path,
                }
            }
            Err(error) => {
                error!(stage = %Stage::Publish, error = %error, "Failed to publish result");
                Outcome::PublishFailed {
                    video_path: event.video_path,
                    manifest_path,
                    error,
                }
            }
        }
    }

    /// Everything up to, and including, reading the stored manifest back.
    async fn produce_manifest(
        &self,
        event: &InboundEvent,
        cancel: &CancellationToken,
    ) -> Result<(PathBuf, String), Failure> {
        checkpoint(cancel, Stage::Workspace)?;
        let workspace = Workspace::for_event(&self.settings.workspace_root, event);
        workspace.prepare().await.map_err(|source| {
            Failure::new(
                Stage::Workspace,
                PipelineError::Workspace {
                    path: workspace.path().to_path_buf(),
                    source,
                },
            )
        })?;
        let stale = workspace
            .clear_segments(&self.settings.segment_extension)
            .await
            .map_err(|source| {
                Failure::new(
                    Stage::Workspace,
                    PipelineError::Workspace {
                        path: workspace.path().to_path_buf(),
                        source,
                    },
                )
            })?;
        if stale > 0 {
            debug!(stage = %Stage::Workspace, stale, "Removed segments from an earlier run");
        }
        info!(stage = %Stage::Workspace, workspace = %workspace.path().display(), "Workspace ready");

        checkpoint(cancel, Stage::Encode)?;
        let encoded = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Failure::new(
                    Stage::Encode,
                    PipelineError::Cancelled { stage: Stage::Encode },
                ));
            }
            result = self.encode_ladder(Path::new(&event.video_path), &workspace) => {
                result.map_err(|e| Failure::new(Stage::Encode, e))?
            }
        };
        info!(stage = %Stage::Encode, segments = encoded.len(), "Ladder encoded");

        checkpoint(cancel, Stage::Discover)?;
        let segments = workspace
            .discover_segments(&self.settings.segment_extension)
            .await
            .map_err(|source| {
                Failure::new(
                    Stage::Discover,
                    PipelineError::Workspace {
                        path: workspace.path().to_path_buf(),
                        source,
                    },
                )
            })?;
        if segments.is_empty() {
            warn!(stage = %Stage::Discover, "No segments found in workspace");
        } else {
            debug!(stage = %Stage::Discover, count = segments.len(), "Segments discovered");
        }

        checkpoint(cancel, Stage::Synthesize)?;
        let manifest = synthesize(segments.as_slice(), &self.ladder, &self.settings.manifest);
        info!(
            stage = %Stage::Synthesize,
            duration = %manifest.media_presentation_duration,
            "Manifest synthesized"
        );

        checkpoint(cancel, Stage::Serialize)?;
        let manifest_path = workspace.write_manifest(&manifest).await.map_err(|source| {
            Failure::new(
                Stage::Serialize,
                PipelineError::Serialize {
                    path: workspace.manifest_path(),
                    source,
                },
            )
        })?;

        checkpoint(cancel, Stage::ReadBack)?;
        let content = workspace.read_manifest().await.map_err(|source| {
            Failure::new(
                Stage::ReadBack,
                PipelineError::Serialize {
                    path: manifest_path.clone(),
                    source,
                },
            )
        })?;
        debug!(stage = %Stage::ReadBack, bytes = content.len(), "Manifest stored");

        Ok((manifest_path, content))
    }

    /// Encode every rung, at most `encode_concurrency` at once. The result
    /// keeps ladder order; the first failure aborts the rest.
    async fn encode_ladder(
        &self,
        video_path: &Path,
        workspace: &Workspace,
    ) -> Result<Vec<String>, EncodeError> {
        let concurrency = self.settings.encode_concurrency.max(1);

        stream::iter(self.ladder.iter())
            .map(|rung| async move {
                info!(stage = %Stage::Encode, rung = %rung.label, "Encoding rung");
                self.encoder.encode(video_path, workspace.path(), rung).await
            })
            .buffered(concurrency)
            .try_concat()
            .await
    }
}
