//! DASH manifest (MPD) model and its XML rendering.
//!
//! Rendering is deterministic: every line starts with a two-space prefix,
//! each nesting level adds four spaces, there is no XML declaration and no
//! trailing newline. Childless elements are self-closing.

pub mod synthesizer;

pub use synthesizer::{synthesize, ManifestSettings};

use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

pub const MPD_NAMESPACE: &str = "urn:mpeg:dash:schema:mpd:2011";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const SCHEMA_LOCATION: &str =
    "urn:mpeg:dash:schema:mpd:2011 http://www.mpegdash.org/schemas/2011/MPD.xsd";
/// SegmentList units per second.
pub const TIMESCALE: u64 = 1_000_000;

const LINE_PREFIX: &str = "  ";
const INDENT: &str = "    ";

pub struct Manifest {
    pub xmlns: String,
    pub xmlns_xsi: String,
    pub schema_location: String,
    pub media_presentation_duration: String,
    pub min_buffer_time: String,
    pub periods: Vec<Period>,
}

pub struct Period {
    pub duration: String,
    pub adaptation_sets: Vec<AdaptationSet>,
}

pub struct AdaptationSet {
    pub mime_type: String,
    pub codecs: String,
    pub representations: Vec<Representation>,
}

pub struct Representation {
    pub id: String,
    pub bandwidth: u64,
    pub codecs: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub base_url: Option<String>,
    pub segment_list: SegmentList,
}

pub struct SegmentList {
    /// Segment duration in `timescale` units
    pub duration: u64,
    pub timescale: u64,
    pub segments: Vec<SegmentReference>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReference {
    pub media: String,
}

impl Manifest {
    pub fn new(duration: String, min_buffer_time: String) -> Self {
        Self {
            xmlns: MPD_NAMESPACE.to_string(),
            xmlns_xsi: XSI_NAMESPACE.to_string(),
            schema_location: SCHEMA_LOCATION.to_string(),
            media_presentation_duration: duration,
            min_buffer_time,
            periods: Vec::new(),
        }
    }

    pub fn representations(&self) -> impl Iterator<Item = &Representation> {
        self.periods
            .iter()
            .flat_map(|period| &period.adaptation_sets)
            .flat_map(|set| &set.representations)
    }

    pub fn to_xml(&self) -> String {
        let mut xml = XmlWriter::default();

        xml.open(
            "MPD",
            &[
                ("xmlns", self.xmlns.clone()),
                ("xmlns:xsi", self.xmlns_xsi.clone()),
                ("xsi:schemaLocation", self.schema_location.clone()),
                (
                    "mediaPresentationDuration",
                    self.media_presentation_duration.clone(),
                ),
                ("minBufferTime", self.min_buffer_time.clone()),
            ],
        );
        for period in &self.periods {
            period.render(&mut xml);
        }
        xml.close("MPD");

        xml.finish()
    }

    pub async fn write_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let mut file = File::create(path).await?;
        file.write_all(self.to_xml().as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl Period {
    fn render(&self, xml: &mut XmlWriter) {
        xml.open("Period", &[("duration", self.duration.clone())]);
        for set in &self.adaptation_sets {
            set.render(xml);
        }
        xml.close("Period");
    }
}

impl AdaptationSet {
    fn render(&self, xml: &mut XmlWriter) {
        xml.open(
            "AdaptationSet",
            &[
                ("mimeType", self.mime_type.clone()),
                ("codecs", self.codecs.clone()),
            ],
        );
        for representation in &self.representations {
            representation.render(xml);
        }
        xml.close("AdaptationSet");
    }
}

impl Representation {
    fn render(&self, xml: &mut XmlWriter) {
        xml.open(
            "Representation",
            &[
                ("id", self.id.clone()),
                ("bandwidth", self.bandwidth.to_string()),
                ("codecs", self.codecs.clone()),
                ("width", self.width.to_string()),
                ("height", self.height.to_string()),
                ("frameRate", self.frame_rate.to_string()),
            ],
        );
        if let Some(base_url) = &self.base_url {
            xml.text("BaseURL", base_url);
        }
        self.segment_list.render(xml);
        xml.close("Representation");
    }
}

impl SegmentList {
    fn render(&self, xml: &mut XmlWriter) {
        let attrs = [
            ("duration", self.duration.to_string()),
            ("timescale", self.timescale.to_string()),
        ];
        if self.segments.is_empty() {
            xml.empty("SegmentList", &attrs);
            return;
        }

        xml.open("SegmentList", &attrs);
        for segment in &self.segments {
            xml.empty("SegmentURL", &[("media", segment.media.clone())]);
        }
        xml.close("SegmentList");
    }
}

/// `PT<seconds>S`
pub fn iso_duration(seconds: u64) -> String {
    format!("PT{}S", seconds)
}

#[derive(Default)]
struct XmlWriter {
    out: String,
    depth: usize,
}

impl XmlWriter {
    fn line(&mut self, content: &str) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        self.out.push_str(LINE_PREFIX);
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(content);
    }

    fn open(&mut self, name: &str, attrs: &[(&str, String)]) {
        let tag = start_tag(name, attrs, false);
        self.line(&tag);
        self.depth += 1;
    }

    fn close(&mut self, name: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(&format!("</{}>", name));
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, String)]) {
        let tag = start_tag(name, attrs, true);
        self.line(&tag);
    }

    fn text(&mut self, name: &str, text: &str) {
        self.line(&format!("<{0}>{1}</{0}>", name, escape_xml(text)));
    }

    fn finish(self) -> String {
        self.out
    }
}

fn start_tag(name: &str, attrs: &[(&str, String)], self_closing: bool) -> String {
    let mut tag = format!("<{}", name);
    for (key, value) in attrs {
        tag.push_str(&format!(" {}=\"{}\"", key, escape_xml(value)));
    }
    tag.push_str(if self_closing { "/>" } else { ">" });
    tag
}

fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    fn single_rung_manifest(segments: &[&str]) -> Manifest {
        let duration = iso_duration(segments.len() as u64 * 5);
        let mut manifest = Manifest::new(duration.clone(), "PT1.5S".to_string());
        manifest.periods.push(Period {
            duration,
            adaptation_sets: vec![AdaptationSet {
                mime_type: "video/webm".to_string(),
                codecs: "vp09.00.10.08".to_string(),
                representations: vec![Representation {
                    id: "144p".to_string(),
                    bandwidth: 150_000,
                    codecs: "vp09.00.10.08".to_string(),
                    width: 256,
                    height: 144,
                    frame_rate: 25,
                    base_url: None,
                    segment_list: SegmentList {
                        duration: 5 * TIMESCALE,
                        timescale: TIMESCALE,
                        segments: segments
                            .iter()
                            .map(|media| SegmentReference {
                                media: media.to_string(),
                            })
                            .collect(),
                    },
                }],
            }],
        });
        manifest
    }

    #[test]
    fn test_manifest_golden_layout() {
        let manifest = single_rung_manifest(&[
            "in.mp4_144p_segment_000.webm",
            "in.mp4_144p_segment_001.webm",
        ]);

        let expected = concat!(
            "  <MPD xmlns=\"urn:mpeg:dash:schema:mpd:2011\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:schemaLocation=\"urn:mpeg:dash:schema:mpd:2011 http://www.mpegdash.org/schemas/2011/MPD.xsd\" mediaPresentationDuration=\"PT10S\" minBufferTime=\"PT1.5S\">\n",
            "      <Period duration=\"PT10S\">\n",
            "          <AdaptationSet mimeType=\"video/webm\" codecs=\"vp09.00.10.08\">\n",
            "              <Representation id=\"144p\" bandwidth=\"150000\" codecs=\"vp09.00.10.08\" width=\"256\" height=\"144\" frameRate=\"25\">\n",
            "                  <SegmentList duration=\"5000000\" timescale=\"1000000\">\n",
            "                      <SegmentURL media=\"in.mp4_144p_segment_000.webm\"/>\n",
            "                      <SegmentURL media=\"in.mp4_144p_segment_001.webm\"/>\n",
            "                  </SegmentList>\n",
            "              </Representation>\n",
            "          </AdaptationSet>\n",
            "      </Period>\n",
            "  </MPD>",
        );

        assert_eq!(manifest.to_xml(), expected);
    }

    #[test]
    fn test_empty_segment_list_is_self_closing() {
        let xml = single_rung_manifest(&[]).to_xml();
        assert!(xml.contains("<SegmentList duration=\"5000000\" timescale=\"1000000\"/>"));
        assert!(xml.contains("mediaPresentationDuration=\"PT0S\""));
        assert!(!xml.contains("<SegmentURL"));
    }

    #[test]
    fn test_base_url_is_rendered_and_escaped() {
        let mut manifest = single_rung_manifest(&["a_144p_segment_000.webm"]);
        manifest.periods[0].adaptation_sets[0].representations[0].base_url =
            Some("https://cdn.example.com/v?a=1&b=2".to_string());

        let xml = manifest.to_xml();
        assert!(xml.contains(
            "                  <BaseURL>https://cdn.example.com/v?a=1&amp;b=2</BaseURL>\n"
        ));
    }

    #[test]
    fn test_xml_escaping() {
        assert_eq!(escape_xml("a&b"), "a&amp;b");
        assert_eq!(escape_xml("<tag>"), "&lt;tag&gt;");
        assert_eq!(escape_xml("\"q\" 'a'"), "&quot;q&quot; &apos;a&apos;");
    }

    #[test]
    fn test_iso_duration() {
        assert_eq!(iso_duration(0), "PT0S");
        assert_eq!(iso_duration(50), "PT50S");
    }

    #[test]
    fn test_rendered_manifest_is_well_formed() {
        use quick_xml::events::Event;
        use quick_xml::Reader;

        let xml = single_rung_manifest(&["x_144p_segment_000.webm", "x_144p_segment_001.webm"])
            .to_xml();
        let mut reader = Reader::from_str(&xml);
        let mut segment_urls = 0;
        let mut depth = 0i32;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                Event::Empty(e) if e.name().as_ref() == b"SegmentURL" => segment_urls += 1,
                Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(depth, 0);
        assert_eq!(segment_urls, 2);
    }

    #[tokio::test]
    async fn test_write_to_persists_exact_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.mpd");
        let manifest = single_rung_manifest(&["in.mp4_144p_segment_000.webm"]);

        manifest.write_to(&path).await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, manifest.to_xml());
    }
}
