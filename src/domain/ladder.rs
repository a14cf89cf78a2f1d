//! Resolution ladder: the ordered set of rungs every upload is encoded to.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Encoder bitrate used for labels missing from the lookup table.
pub const DEFAULT_BITRATE: &str = "1500k";

/// One resolution/bitrate tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRung {
    /// Rung label, also the representation id (e.g. "720p")
    pub label: String,
    /// Advertised bandwidth in bits per second
    pub bitrate: u64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl ResolutionRung {
    pub fn new(
        label: impl Into<String>,
        bitrate: u64,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Self {
        Self {
            label: label.into(),
            bitrate,
            width,
            height,
            frame_rate,
        }
    }
}

#[derive(Debug, Error)]
pub enum LadderError {
    #[error("ladder has no rungs")]
    Empty,
    #[error("duplicate rung label {0:?}")]
    DuplicateLabel(String),
    #[error("invalid rung label {0:?}: labels must be non-empty and free of '_' and '/'")]
    InvalidLabel(String),
    #[error("failed to read ladder file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse ladder file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Ordered, validated list of rungs. Order is the representation order in
/// the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ladder {
    rungs: Vec<ResolutionRung>,
}

impl Ladder {
    pub fn new(rungs: Vec<ResolutionRung>) -> Result<Self, LadderError> {
        if rungs.is_empty() {
            return Err(LadderError::Empty);
        }

        let mut seen = HashSet::with_capacity(rungs.len());
        for rung in &rungs {
            // The label is embedded in segment file names between '_' separators.
            if rung.label.is_empty() || rung.label.contains(|c| c == '_' || c == '/') {
                return Err(LadderError::InvalidLabel(rung.label.clone()));
            }
            if !seen.insert(rung.label.as_str()) {
                return Err(LadderError::DuplicateLabel(rung.label.clone()));
            }
        }

        Ok(Self { rungs })
    }

    /// The six-rung VP9 ladder from 144p to 2160p.
    pub fn standard() -> Self {
        Self {
            rungs: vec![
                ResolutionRung::new("144p", 150_000, 256, 144, 25),
                ResolutionRung::new("240p", 300_000, 426, 240, 25),
                ResolutionRung::new("720p", 1_500_000, 1280, 720, 30),
                ResolutionRung::new("1080p", 3_000_000, 1920, 1080, 30),
                ResolutionRung::new("1440p", 6_000_000, 2560, 1440, 30),
                ResolutionRung::new("2160p", 12_000_000, 3840, 2160, 30),
            ],
        }
    }

    /// Load a ladder from a JSON array of rungs.
    pub fn from_json_file(path: &Path) -> Result<Self, LadderError> {
        let raw = std::fs::read(path).map_err(|source| LadderError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let rungs: Vec<ResolutionRung> =
            serde_json::from_slice(&raw).map_err(|source| LadderError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(rungs)
    }

    pub fn rungs(&self) -> &[ResolutionRung] {
        &self.rungs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolutionRung> {
        self.rungs.iter()
    }

    pub fn get(&self, label: &str) -> Option<&ResolutionRung> {
        self.rungs.iter().find(|rung| rung.label == label)
    }
}

impl<'a> IntoIterator for &'a Ladder {
    type Item = &'a ResolutionRung;
    type IntoIter = std::slice::Iter<'a, ResolutionRung>;

    fn into_iter(self) -> Self::IntoIter {
        self.rungs.iter()
    }
}

/// Encoder target bitrate for a rung label. Unknown labels get
/// [`DEFAULT_BITRATE`].
pub fn bitrate_for(label: &str) -> &'static str {
    match label {
        "144p" => "150k",
        "240p" => "300k",
        "720p" => "1500k",
        "1080p" => "3000k",
        "1440p" => "6000k",
        "2160p" => "12000k",
        _ => DEFAULT_BITRATE,
    }
}
