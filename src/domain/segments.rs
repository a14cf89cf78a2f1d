//! Segment file naming: `<base>_<rung>_segment_<NNN>.<ext>`.

use regex::Regex;
use std::sync::OnceLock;

const SEGMENT_MARKER: &str = "_segment_";

fn segment_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<base>.+)_(?P<rung>[^_/]+)_segment_(?P<index>\d+)\.(?P<ext>[A-Za-z0-9]+)$")
            .expect("segment name pattern is valid")
    })
}

/// Parsed segment file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentName {
    /// Source file name the segment was cut from (e.g. "in.mp4")
    pub base: String,
    /// Rung label (e.g. "144p")
    pub rung: String,
    pub index: u32,
    pub extension: String,
}

impl SegmentName {
    /// Parse a bare file name. Returns `None` for anything that does not
    /// follow the segment naming scheme.
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = segment_name_regex().captures(file_name)?;
        Some(Self {
            base: caps["base"].to_string(),
            rung: caps["rung"].to_string(),
            index: caps["index"].parse().ok()?,
            extension: caps["ext"].to_string(),
        })
    }
}

/// Discovery filter: contains the segment marker and has the expected extension.
pub fn is_segment_file(file_name: &str, extension: &str) -> bool {
    file_name.contains(SEGMENT_MARKER)
        && file_name
            .strip_suffix(extension)
            .is_some_and(|stem| stem.ends_with('.'))
}

/// Common prefix of every segment produced for one rung of one source.
pub fn segment_prefix(base: &str, rung: &str) -> String {
    format!("{}_{}{}", base, rung, SEGMENT_MARKER)
}

/// printf-style output pattern handed to the encoder.
pub fn output_pattern(base: &str, rung: &str, extension: &str) -> String {
    format!("{}%03d.{}", segment_prefix(base, rung), extension)
}
