//! External encoder adapter: one `av1an` run per rung.

use crate::adapters::fs::list_files;
use crate::domain::ladder::{bitrate_for, ResolutionRung};
use crate::domain::segments::{output_pattern, segment_prefix};
use crate::ports::encoder::{EncodeError, Encoder};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info};

/// Bytes of encoder stderr kept in a failure report.
const STDERR_TAIL: usize = 2048;
/// Bytes of stderr buffered while the encoder runs.
const STDERR_BUFFER: usize = 2 * STDERR_TAIL;

#[derive(Debug, Clone)]
pub struct Av1anEncoder {
    program: PathBuf,
    codec: String,
    extension: String,
}

impl Av1anEncoder {
    pub fn new(
        program: impl Into<PathBuf>,
        codec: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            codec: codec.into(),
            extension: extension.into(),
        }
    }

    /// `-i <video> -o <workspace> -c <codec> -b <bitrate> -p <pattern>`
    pub fn arguments(
        &self,
        video_path: &Path,
        workspace: &Path,
        rung: &ResolutionRung,
    ) -> Vec<OsString> {
        let pattern = workspace.join(output_pattern(
            &source_base_name(video_path),
            &rung.label,
            &self.extension,
        ));

        vec![
            "-i".into(),
            video_path.into(),
            "-o".into(),
            workspace.into(),
            "-c".into(),
            self.codec.clone().into(),
            "-b".into(),
            bitrate_for(&rung.label).into(),
            "-p".into(),
            pattern.into(),
        ]
    }
}

impl Default for Av1anEncoder {
    fn default() -> Self {
        Self::new("av1an", "vp9", "webm")
    }
}

#[async_trait]
impl Encoder for Av1anEncoder {
    async fn encode(
        &self,
        video_path: &Path,
        workspace: &Path,
        rung: &ResolutionRung,
    ) -> Result<Vec<String>, EncodeError> {
        let args = self.arguments(video_path, workspace, rung);
        debug!(program = %self.program.display(), ?args, "Launching encoder");

        // Dropping the future (cancellation) kills the child.
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncodeError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        let stderr = child.stderr.take();
        let (status, stderr) = tokio::join!(child.wait(), read_tail(stderr, STDERR_BUFFER));
        let status = status.map_err(|source| EncodeError::Wait {
            rung: rung.label.clone(),
            source,
        })?;

        if !status.success() {
            return Err(EncodeError::Failed {
                rung: rung.label.clone(),
                status: status.to_string(),
                stderr: stderr_tail(&stderr),
            });
        }

        let prefix = segment_prefix(&source_base_name(video_path), &rung.label);
        let suffix = format!(".{}", self.extension);
        let produced = list_files(workspace, |name| {
            name.starts_with(&prefix) && name.ends_with(&suffix)
        })
        .await
        .map_err(|source| EncodeError::Scan {
            rung: rung.label.clone(),
            source,
        })?;

        info!(rung = %rung.label, segments = produced.len(), "Rung encoded");
        Ok(produced)
    }
}

fn source_base_name(video_path: &Path) -> String {
    video_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| video_path.to_string_lossy().into_owned())
}

/// Drain `reader` to the end, keeping only its last `limit` bytes.
async fn read_tail<R>(reader: Option<R>, limit: usize) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut tail = Vec::with_capacity(limit);
    let Some(mut reader) = reader else {
        return tail;
    };

    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > limit {
                    let excess = tail.len() - limit;
                    tail.drain(..excess);
                }
            }
        }
    }
    tail
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn rung(label: &str) -> ResolutionRung {
        ResolutionRung::new(label, 150_000, 256, 144, 25)
    }

    #[test]
    fn test_arguments_layout() {
        let encoder = Av1anEncoder::default();
        let args = encoder.arguments(Path::new("/tmp/in.mp4"), Path::new("/work"), &rung("144p"));

        let expected: Vec<OsString> = [
            "-i",
            "/tmp/in.mp4",
            "-o",
            "/work",
            "-c",
            "vp9",
            "-b",
            "150k",
            "-p",
            "/work/in.mp4_144p_segment_%03d.webm",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_arguments_use_default_bitrate_for_unknown_rung() {
        let encoder = Av1anEncoder::default();
        let args = encoder.arguments(Path::new("/tmp/in.mp4"), Path::new("/work"), &rung("480p"));
        assert_eq!(args[7], OsString::from("1500k"));
    }

    #[test]
    fn test_stderr_tail_truncates_long_output() {
        let long = "x".repeat(STDERR_TAIL + 10);
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.starts_with("..."));
        assert_eq!(tail.len(), STDERR_TAIL + 3);
        assert_eq!(stderr_tail(b"  short  "), "short");
    }

    #[tokio::test]
    async fn test_read_tail_keeps_only_the_end() {
        let mut input = vec![b'a'; 10_000];
        input.extend_from_slice(b"final error");
        let reader: &[u8] = &input;

        let tail = read_tail(Some(reader), 64).await;

        assert_eq!(tail.len(), 64);
        assert!(tail.ends_with(b"final error"));
        assert!(read_tail(None::<&[u8]>, 64).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_program_is_a_launch_error() {
        let workspace = tempdir().unwrap();
        let encoder = Av1anEncoder::new(workspace.path().join("no-such-encoder"), "vp9", "webm");

        let result = encoder
            .encode(Path::new("/tmp/in.mp4"), workspace.path(), &rung("144p"))
            .await;

        assert!(matches!(result, Err(EncodeError::Launch { .. })));
    }

    #[cfg(unix)]
    fn fake_encoder(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-av1an");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_reports_rung_segments() {
        let bin = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        // ${10} is the output pattern
        let program = fake_encoder(
            bin.path(),
            r#"touch "$(printf "${10}" 0)" "$(printf "${10}" 1)""#,
        );
        std::fs::write(workspace.path().join("in.mp4_720p_segment_000.webm"), b"").unwrap();

        let encoder = Av1anEncoder::new(program, "vp9", "webm");
        let produced = encoder
            .encode(Path::new("/tmp/in.mp4"), workspace.path(), &rung("144p"))
            .await
            .unwrap();

        assert_eq!(
            produced,
            ["in.mp4_144p_segment_000.webm", "in.mp4_144p_segment_001.webm"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_a_failure() {
        let bin = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        let program = fake_encoder(bin.path(), "echo 'unsupported input' >&2\nexit 3");

        let encoder = Av1anEncoder::new(program, "vp9", "webm");
        let result = encoder
            .encode(Path::new("/tmp/in.mp4"), workspace.path(), &rung("144p"))
            .await;

        match result {
            Err(EncodeError::Failed { rung, stderr, .. }) => {
                assert_eq!(rung, "144p");
                assert_eq!(stderr, "unsupported input");
            }
            other => panic!("expected encode failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_noisy_failure_reports_bounded_stderr() {
        let bin = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        let program = fake_encoder(
            bin.path(),
            "head -c 200000 /dev/zero | tr '\\0' 'x' >&2\necho 'last line' >&2\nexit 1",
        );

        let encoder = Av1anEncoder::new(program, "vp9", "webm");
        let result = encoder
            .encode(Path::new("/tmp/in.mp4"), workspace.path(), &rung("144p"))
            .await;

        match result {
            Err(EncodeError::Failed { stderr, .. }) => {
                assert!(stderr.starts_with("..."));
                assert!(stderr.ends_with("last line"));
                assert_eq!(stderr.len(), STDERR_TAIL + 3);
            }
            other => panic!("expected encode failure, got {:?}", other),
        }
    }
}
