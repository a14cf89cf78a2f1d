use super::{
    iso_duration, AdaptationSet, Manifest, Period, Representation, SegmentList,
    SegmentReference, TIMESCALE,
};
use crate::domain::ladder::Ladder;
use crate::domain::segments::SegmentName;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Static manifest attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSettings {
    /// Length of every encoded segment, in whole seconds
    pub segment_duration_secs: u64,
    pub min_buffer_time: String,
    pub mime_type: String,
    pub codecs: String,
    /// Optional BaseURL; `{rung}` is replaced by the rung label
    pub base_url: Option<String>,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            segment_duration_secs: 5,
            min_buffer_time: "PT1.5S".to_string(),
            mime_type: "video/webm".to_string(),
            codecs: "vp09.00.10.08".to_string(),
            base_url: None,
        }
    }
}

/// Build the manifest for one video from the segment file names found in its
/// workspace.
///
/// Each representation lists only the segments whose parsed rung matches its
/// label, ordered by segment index. Names that do not parse, or that belong
/// to a rung outside the ladder, are ignored. The presentation duration is
/// derived from the longest rung's segment count.
pub fn synthesize<S: AsRef<str>>(
    segment_files: &[S],
    ladder: &Ladder,
    settings: &ManifestSettings,
) -> Manifest {
    let mut by_rung: HashMap<&str, BTreeSet<(u32, String)>> = ladder
        .iter()
        .map(|rung| (rung.label.as_str(), BTreeSet::new()))
        .collect();

    for file in segment_files {
        let file = file.as_ref();
        let Some(name) = SegmentName::parse(file) else {
            debug!(file, "Ignoring file that is not a segment");
            continue;
        };
        match by_rung.get_mut(name.rung.as_str()) {
            Some(segments) => {
                segments.insert((name.index, file.to_string()));
            }
            None => debug!(file, rung = %name.rung, "Ignoring segment for unknown rung"),
        }
    }

    let representations: Vec<Representation> = ladder
        .iter()
        .map(|rung| {
            let segments = by_rung
                .remove(rung.label.as_str())
                .unwrap_or_default()
                .into_iter()
                .map(|(_, media)| SegmentReference { media })
                .collect();

            Representation {
                id: rung.label.clone(),
                bandwidth: rung.bitrate,
                codecs: settings.codecs.clone(),
                width: rung.width,
                height: rung.height,
                frame_rate: rung.frame_rate,
                base_url: settings
                    .base_url
                    .as_ref()
                    .map(|url| url.replace("{rung}", &rung.label)),
                segment_list: SegmentList {
                    duration: settings.segment_duration_secs.saturating_mul(TIMESCALE),
                    timescale: TIMESCALE,
                    segments,
                },
            }
        })
        .collect();

    let segment_count = representations
        .iter()
        .map(|representation| representation.segment_list.segments.len())
        .max()
        .unwrap_or(0) as u64;
    let duration = iso_duration(segment_count.saturating_mul(settings.segment_duration_secs));

    debug!(
        representations = representations.len(),
        segment_count,
        duration = %duration,
        "Synthesized manifest"
    );

    let mut manifest = Manifest::new(duration.clone(), settings.min_buffer_time.clone());
    manifest.periods.push(Period {
        duration,
        adaptation_sets: vec![AdaptationSet {
            mime_type: settings.mime_type.clone(),
            codecs: settings.codecs.clone(),
            representations,
        }],
    });
    manifest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ladder::ResolutionRung;

    fn ladder_144p() -> Ladder {
        Ladder::new(vec![ResolutionRung::new("144p", 150_000, 256, 144, 25)]).unwrap()
    }

    fn segments_for(base: &str, rung: &str, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("{}_{}_segment_{:03}.webm", base, rung, i))
            .collect()
    }

    fn media_of(manifest: &Manifest, id: &str) -> Vec<String> {
        manifest
            .representations()
            .find(|representation| representation.id == id)
            .unwrap()
            .segment_list
            .segments
            .iter()
            .map(|segment| segment.media.clone())
            .collect()
    }

    #[test]
    fn test_two_segments_for_144p() {
        let files = [
            "in.mp4_144p_segment_000.webm",
            "in.mp4_144p_segment_001.webm",
        ];
        let manifest = synthesize(&files, &ladder_144p(), &ManifestSettings::default());

        assert_eq!(media_of(&manifest, "144p"), files);
        assert_eq!(manifest.media_presentation_duration, "PT10S");
        assert_eq!(manifest.periods[0].duration, "PT10S");
    }

    #[test]
    fn test_duration_tracks_segment_count() {
        let settings = ManifestSettings::default();
        for (count, expected) in [(0, "PT0S"), (1, "PT5S"), (10, "PT50S")] {
            let files = segments_for("in.mp4", "144p", count);
            let manifest = synthesize(&files, &ladder_144p(), &settings);
            assert_eq!(manifest.media_presentation_duration, expected);
            assert_eq!(manifest.periods[0].duration, expected);
            assert_eq!(media_of(&manifest, "144p").len(), count);
        }
    }

    #[test]
    fn test_configured_segment_duration() {
        let settings = ManifestSettings {
            segment_duration_secs: 2,
            ..ManifestSettings::default()
        };
        let files = segments_for("in.mp4", "144p", 3);
        let manifest = synthesize(&files, &ladder_144p(), &settings);

        assert_eq!(manifest.media_presentation_duration, "PT6S");
        let representation = manifest.representations().next().unwrap();
        assert_eq!(representation.segment_list.duration, 2_000_000);
        assert_eq!(representation.segment_list.timescale, 1_000_000);
    }

    #[test]
    fn test_empty_input_yields_empty_lists() {
        let files: [&str; 0] = [];
        let manifest = synthesize(&files, &Ladder::standard(), &ManifestSettings::default());

        assert_eq!(manifest.media_presentation_duration, "PT0S");
        assert_eq!(manifest.representations().count(), 6);
        assert!(manifest
            .representations()
            .all(|representation| representation.segment_list.segments.is_empty()));
    }

    #[test]
    fn test_segments_are_filtered_per_rung() {
        let mut files = segments_for("in.mp4", "144p", 2);
        files.extend(segments_for("in.mp4", "720p", 3));
        files.push("in.mp4_480p_segment_000.webm".to_string());
        files.push("notes.txt".to_string());

        let manifest = synthesize(&files, &Ladder::standard(), &ManifestSettings::default());

        assert_eq!(media_of(&manifest, "144p"), segments_for("in.mp4", "144p", 2));
        assert_eq!(media_of(&manifest, "720p"), segments_for("in.mp4", "720p", 3));
        assert!(media_of(&manifest, "1080p").is_empty());
        // longest rung decides the presentation length
        assert_eq!(manifest.media_presentation_duration, "PT15S");
    }

    #[test]
    fn test_multi_rung_duration_uses_longest_rung_not_total() {
        let mut files = segments_for("in.mp4", "144p", 4);
        files.extend(segments_for("in.mp4", "240p", 2));
        files.extend(segments_for("in.mp4", "720p", 4));

        let manifest = synthesize(&files, &Ladder::standard(), &ManifestSettings::default());

        // 10 files in total, but every rung plays for at most 4 * 5s
        assert_eq!(manifest.media_presentation_duration, "PT20S");
        assert_eq!(manifest.periods[0].duration, "PT20S");
    }

    #[test]
    fn test_representations_follow_ladder_order_not_listing_order() {
        let mut files = segments_for("in.mp4", "2160p", 1);
        files.extend(segments_for("in.mp4", "240p", 1));
        files.extend(segments_for("in.mp4", "144p", 1));
        files.reverse();

        let manifest = synthesize(&files, &Ladder::standard(), &ManifestSettings::default());
        let ids: Vec<&str> = manifest
            .representations()
            .map(|representation| representation.id.as_str())
            .collect();

        assert_eq!(ids, ["144p", "240p", "720p", "1080p", "1440p", "2160p"]);
    }

    #[test]
    fn test_segments_ordered_by_index_and_deduplicated() {
        let files = [
            "in.mp4_144p_segment_010.webm",
            "in.mp4_144p_segment_002.webm",
            "in.mp4_144p_segment_002.webm",
            "in.mp4_144p_segment_009.webm",
        ];
        let manifest = synthesize(&files, &ladder_144p(), &ManifestSettings::default());

        assert_eq!(
            media_of(&manifest, "144p"),
            [
                "in.mp4_144p_segment_002.webm",
                "in.mp4_144p_segment_009.webm",
                "in.mp4_144p_segment_010.webm",
            ]
        );
    }

    #[test]
    fn test_identical_inputs_render_identically() {
        let mut files = segments_for("in.mp4", "720p", 4);
        files.extend(segments_for("in.mp4", "144p", 4));
        let mut shuffled = files.clone();
        shuffled.rotate_left(3);

        let settings = ManifestSettings::default();
        let first = synthesize(&files, &Ladder::standard(), &settings).to_xml();
        let second = synthesize(&shuffled, &Ladder::standard(), &settings).to_xml();

        assert_eq!(first, second);
    }

    #[test]
    fn test_base_url_template() {
        let settings = ManifestSettings {
            base_url: Some("https://cdn.example.com/video_{rung}/".to_string()),
            ..ManifestSettings::default()
        };
        let manifest = synthesize(&segments_for("in.mp4", "144p", 1), &ladder_144p(), &settings);

        assert_eq!(
            manifest.representations().next().unwrap().base_url.as_deref(),
            Some("https://cdn.example.com/video_144p/")
        );
    }
}
