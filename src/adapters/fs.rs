//! Per-video workspace on the local (or shared) filesystem.

use crate::domain::dash::Manifest;
use crate::domain::events::InboundEvent;
use crate::domain::segments::is_segment_file;
use std::io;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "output.mpd";

/// Directory holding one video's segments and manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<root>/<workspace id>`, see [`InboundEvent::workspace_id`].
    pub fn for_event(root: &Path, event: &InboundEvent) -> Self {
        Self::new(root.join(event.workspace_id().to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE_NAME)
    }

    /// Create the directory if needed. Idempotent.
    pub async fn prepare(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Segment files currently in the workspace, sorted by name.
    pub async fn discover_segments(&self, extension: &str) -> io::Result<Vec<String>> {
        list_files(&self.dir, |name| is_segment_file(name, extension)).await
    }

    /// Delete segment files left by an earlier run for the same video.
    /// Returns how many were removed.
    pub async fn clear_segments(&self, extension: &str) -> io::Result<usize> {
        let stale = self.discover_segments(extension).await?;
        for name in &stale {
            match tokio::fs::remove_file(self.dir.join(name)).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(stale.len())
    }

    pub async fn write_manifest(&self, manifest: &Manifest) -> io::Result<PathBuf> {
        let path = self.manifest_path();
        manifest.write_to(&path).await?;
        Ok(path)
    }

    /// The manifest exactly as stored on disk.
    pub async fn read_manifest(&self) -> io::Result<String> {
        tokio::fs::read_to_string(self.manifest_path()).await
    }
}

/// Names of the regular files in `dir` accepted by `filter`, sorted.
/// Names that are not valid UTF-8 are skipped.
pub async fn list_files<F>(dir: &Path, filter: F) -> io::Result<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if filter(name) {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}
