//! DASH manifest handling: fetch, parse and rewrite.
//!
//! Only the one manifest shape served by the lecture platform is
//! understood: a root `MPD` element with a `PT…M` duration, one
//! `AdaptationSet` with `mimeType="video/mp4"` and one with
//! `mimeType="audio/mp4"`, each carrying a `SegmentTemplate` with
//! `initialization` and `media` attributes. Anything else is a
//! [`SlidegrabError::ManifestParse`]; there is no schema validation and no
//! fallback.

use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use reqwest::Url;
use reqwest::blocking::Client;

use crate::error::SlidegrabError;
use crate::http;
use crate::layout::{AUDIO_SEGMENTS_DIR, VIDEO_SEGMENTS_DIR};

/// Placeholder replaced by the segment number in media templates.
pub const NUMBER_PLACEHOLDER: &str = "$Number$";

/// File name of the initialization segment inside a segment directory.
pub const INIT_SEGMENT_FILE: &str = "segmenti.mp4";

static VIDEO_SET: LazyLock<Regex> = LazyLock::new(|| adaptation_set_regex("video/mp4"));
static AUDIO_SET: LazyLock<Regex> = LazyLock::new(|| adaptation_set_regex("audio/mp4"));
static INITIALIZATION_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\binitialization\s*=\s*"([^"]+)""#).expect("Invalid regex"));
static MEDIA_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bmedia\s*=\s*"([^"]+)""#).expect("Invalid regex"));
static ROOT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<(?:\w+:)?MPD\b[^>]*>").expect("Invalid regex"));
static PRESENTATION_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bmediaPresentationDuration\s*=\s*"([^"]+)""#).expect("Invalid regex")
});
static MINUTES_DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PT(?:\d+H)?\d+M").expect("Invalid regex"));
/// Longest presentation accepted from a manifest: one day.
pub const MAX_DURATION_MINUTES: u64 = 24 * 60;
static DURATION_PARTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?$").expect("Invalid regex")
});

fn adaptation_set_regex(mime_type: &str) -> Regex {
    let pattern = format!(
        r#"(?s)<AdaptationSet\b[^>]*\bmimeType\s*=\s*"{}"[^>]*>.*?</AdaptationSet>"#,
        regex::escape(mime_type)
    );
    Regex::new(&pattern).expect("Invalid regex")
}

/// Which rendition a template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Video,
    Audio,
}

impl Track {
    /// Local segment directory name, relative to the label directory.
    pub fn directory_name(self) -> &'static str {
        match self {
            Track::Video => VIDEO_SEGMENTS_DIR,
            Track::Audio => AUDIO_SEGMENTS_DIR,
        }
    }

    fn set_regex(self) -> &'static Regex {
        match self {
            Track::Video => &VIDEO_SET,
            Track::Audio => &AUDIO_SET,
        }
    }

    fn mime_type(self) -> &'static str {
        match self {
            Track::Video => "video/mp4",
            Track::Audio => "audio/mp4",
        }
    }
}

/// What the acquisition pipeline needs from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDescriptor {
    pub video_init_url: String,
    pub video_media_template: String,
    pub audio_init_url: String,
    pub audio_media_template: String,
    /// Presentation length in whole minutes.
    pub duration_minutes: u64,
}

impl ManifestDescriptor {
    /// `(initialization URL, media template)` of one track.
    pub fn track(&self, track: Track) -> (&str, &str) {
        match track {
            Track::Video => (&self.video_init_url, &self.video_media_template),
            Track::Audio => (&self.audio_init_url, &self.audio_media_template),
        }
    }

    /// Resolve relative segment URLs against the manifest location.
    /// Absolute URLs are left unchanged.
    #[must_use]
    pub fn resolved_against(self, manifest_url: &str) -> Self {
        let Ok(base) = Url::parse(manifest_url) else {
            return self;
        };
        let resolve = |reference: String| match base.join(&reference) {
            Ok(url) => url.to_string().replace("%24Number%24", NUMBER_PLACEHOLDER),
            Err(_) => reference,
        };
        Self {
            video_init_url: resolve(self.video_init_url),
            video_media_template: resolve(self.video_media_template),
            audio_init_url: resolve(self.audio_init_url),
            audio_media_template: resolve(self.audio_media_template),
            duration_minutes: self.duration_minutes,
        }
    }
}

/// Download the manifest at `url` to `destination`.
///
/// # Errors
///
/// Returns [`SlidegrabError::Network`] for a non-success status,
/// [`SlidegrabError::Http`] for transport failures and
/// [`SlidegrabError::IoError`] if the file cannot be written.
pub fn fetch_manifest(client: &Client, url: &str, destination: &Path) -> Result<(), SlidegrabError> {
    log::debug!("Fetching manifest {url}");
    let bytes = http::fetch_to_file(client, url, destination)?;
    log::debug!("Manifest saved to {} ({bytes} bytes)", destination.display());
    Ok(())
}

/// Extract segment templates and duration from manifest text.
///
/// # Errors
///
/// Returns [`SlidegrabError::ManifestParse`] if an adaptation set, one of
/// its attributes or the duration is missing, or if a media template has no
/// `$Number$` placeholder.
pub fn parse_manifest(text: &str) -> Result<ManifestDescriptor, SlidegrabError> {
    let (video_init_url, video_media_template) = parse_track(text, Track::Video)?;
    let (audio_init_url, audio_media_template) = parse_track(text, Track::Audio)?;

    Ok(ManifestDescriptor {
        video_init_url,
        video_media_template,
        audio_init_url,
        audio_media_template,
        duration_minutes: parse_duration_minutes(text)?,
    })
}

/// Read and parse a manifest file.
///
/// # Errors
///
/// Returns [`SlidegrabError::IoError`] if the file cannot be read, plus
/// everything [`parse_manifest`] returns.
pub fn parse_manifest_file(path: &Path) -> Result<ManifestDescriptor, SlidegrabError> {
    let text = fs::read_to_string(path)?;
    parse_manifest(&text)
}

fn parse_track(text: &str, track: Track) -> Result<(String, String), SlidegrabError> {
    let set = &text[adaptation_set_range(text, track)?];

    let initialization = first_attribute(set, &INITIALIZATION_ATTR).ok_or_else(|| {
        SlidegrabError::ManifestParse(format!(
            "{} adaptation set has no initialization attribute",
            track.mime_type()
        ))
    })?;
    let media = first_attribute(set, &MEDIA_ATTR).ok_or_else(|| {
        SlidegrabError::ManifestParse(format!(
            "{} adaptation set has no media attribute",
            track.mime_type()
        ))
    })?;

    if !media.contains(NUMBER_PLACEHOLDER) {
        return Err(SlidegrabError::ManifestParse(format!(
            "{} media template `{media}` has no {NUMBER_PLACEHOLDER} placeholder",
            track.mime_type()
        )));
    }

    Ok((initialization, media))
}

fn adaptation_set_range(text: &str, track: Track) -> Result<Range<usize>, SlidegrabError> {
    track
        .set_regex()
        .find(text)
        .map(|found| found.range())
        .ok_or_else(|| {
            SlidegrabError::ManifestParse(format!(
                "no AdaptationSet with mimeType=\"{}\"",
                track.mime_type()
            ))
        })
}

fn first_attribute(set: &str, attribute: &Regex) -> Option<String> {
    attribute
        .captures(set)
        .and_then(|captures| captures.get(1))
        .map(|value| unescape_xml(value.as_str()))
}

/// Presentation length in minutes, from the root element.
///
/// `mediaPresentationDuration` is preferred; otherwise the first `PT…M`
/// value on the root element is used. Hours count as 60 minutes, leftover
/// seconds round up to a whole minute, and anything past
/// [`MAX_DURATION_MINUTES`] is rejected.
fn parse_duration_minutes(text: &str) -> Result<u64, SlidegrabError> {
    let root = ROOT_TAG
        .find(text)
        .ok_or_else(|| SlidegrabError::ManifestParse("no MPD root element".to_string()))?
        .as_str();

    let duration = PRESENTATION_DURATION
        .captures(root)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str())
        .or_else(|| MINUTES_DURATION.find(root).map(|found| found.as_str()))
        .ok_or_else(|| {
            SlidegrabError::ManifestParse("MPD element carries no duration".to_string())
        })?;

    let parts = DURATION_PARTS.captures(duration).ok_or_else(|| {
        SlidegrabError::ManifestParse(format!("unsupported duration `{duration}`"))
    })?;
    if duration == "PT" {
        return Err(SlidegrabError::ManifestParse(format!(
            "empty duration `{duration}`"
        )));
    }

    let too_long = || {
        SlidegrabError::ManifestParse(format!(
            "duration `{duration}` exceeds {MAX_DURATION_MINUTES} minutes"
        ))
    };
    let whole = |index: usize| -> Result<u64, SlidegrabError> {
        parts
            .get(index)
            .map_or(Ok(0), |value| value.as_str().parse().map_err(|_| too_long()))
    };
    let seconds = parts
        .get(3)
        .map_or(Ok(0.0), |value| value.as_str().parse::<f64>())
        .map_err(|_| SlidegrabError::ManifestParse(format!("bad seconds in `{duration}`")))?;
    if seconds > (MAX_DURATION_MINUTES * 60) as f64 {
        return Err(too_long());
    }

    // Partial minutes round up so the last segments are still requested.
    let minutes = whole(1)?
        .checked_mul(60)
        .and_then(|hours| hours.checked_add(whole(2).ok()?))
        .and_then(|minutes| minutes.checked_add((seconds / 60.0).ceil() as u64))
        .filter(|minutes| *minutes <= MAX_DURATION_MINUTES)
        .ok_or_else(too_long)?;
    Ok(minutes)
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Point both tracks at the local segment directories.
///
/// Every `initialization` and `media` attribute inside the video and audio
/// adaptation sets is replaced; the rest of the document is kept verbatim.
///
/// # Errors
///
/// Returns [`SlidegrabError::ManifestParse`] if either adaptation set is
/// missing.
pub fn rewrite_manifest(text: &str) -> Result<String, SlidegrabError> {
    let mut sets = vec![
        (adaptation_set_range(text, Track::Video)?, Track::Video),
        (adaptation_set_range(text, Track::Audio)?, Track::Audio),
    ];
    // Splice from the back so earlier ranges stay valid.
    sets.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));

    let mut rewritten = text.to_string();
    for (range, track) in sets {
        let directory = track.directory_name();
        let initialization = format!("initialization=\"{directory}/{INIT_SEGMENT_FILE}\"");
        let media = format!("media=\"{directory}/segment{NUMBER_PLACEHOLDER}.mp4\"");

        let set = &text[range.clone()];
        let set = INITIALIZATION_ATTR.replace_all(set, NoExpand(&initialization));
        let set = MEDIA_ATTR.replace_all(&set, NoExpand(&media));
        rewritten.replace_range(range, &set);
    }
    Ok(rewritten)
}

/// Rewrite the manifest at `source` and write the result to `destination`.
///
/// # Errors
///
/// Returns [`SlidegrabError::IoError`] on read/write failures and
/// [`SlidegrabError::ManifestParse`] as [`rewrite_manifest`] does.
pub fn write_adjusted_manifest(source: &Path, destination: &Path) -> Result<(), SlidegrabError> {
    let text = fs::read_to_string(source)?;
    fs::write(destination, rewrite_manifest(&text)?)?;
    log::debug!("Wrote local manifest {}", destination.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_forms() {
        let manifest = |duration: &str| {
            format!(r#"<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" mediaPresentationDuration="{duration}" minBufferTime="PT1.5S">"#)
        };
        assert_eq!(parse_duration_minutes(&manifest("PT47M12.3S")).unwrap(), 48);
        assert_eq!(parse_duration_minutes(&manifest("PT47M")).unwrap(), 47);
        assert_eq!(parse_duration_minutes(&manifest("PT1H5M0S")).unwrap(), 65);
        assert_eq!(parse_duration_minutes(&manifest("PT2H")).unwrap(), 120);
        assert_eq!(parse_duration_minutes(&manifest("PT40.5S")).unwrap(), 1);
        assert_eq!(parse_duration_minutes(&manifest("PT2820.5S")).unwrap(), 48);
        assert_eq!(parse_duration_minutes(&manifest("PT0S")).unwrap(), 0);
        assert!(parse_duration_minutes(&manifest("PT")).is_err());
        assert!(parse_duration_minutes(&manifest("P1D")).is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let manifest = |duration: &str| format!(r#"<MPD mediaPresentationDuration="{duration}">"#);
        for duration in [
            "PT400000000000000000H",
            "PT99999999999999999M",
            "PT99999999999999999999999M",
            "PT1e400S",
            "PT25H",
            "PT86401S",
        ] {
            let error = parse_duration_minutes(&manifest(duration)).unwrap_err();
            assert!(
                matches!(error, SlidegrabError::ManifestParse(_)),
                "{duration}: {error:?}"
            );
        }
        assert_eq!(parse_duration_minutes(&manifest("PT24H")).unwrap(), MAX_DURATION_MINUTES);
    }

    #[test]
    fn duration_falls_back_to_any_minutes_value() {
        let root = r#"<MPD type="static" maxSegmentDuration="PT12M">"#;
        assert_eq!(parse_duration_minutes(root).unwrap(), 12);
        assert!(parse_duration_minutes("<Period/>").is_err());
    }

    #[test]
    fn entities_are_unescaped() {
        assert_eq!(unescape_xml("a?x=1&amp;y=2&amp;amp;"), "a?x=1&y=2&amp;");
    }

    #[test]
    fn relative_templates_resolve_against_manifest_url() {
        let descriptor = ManifestDescriptor {
            video_init_url: "v/init.mp4".to_string(),
            video_media_template: "v/seg-$Number$.m4s".to_string(),
            audio_init_url: "https://cdn.example.com/a/init.mp4".to_string(),
            audio_media_template: "/a/seg-$Number$.m4s".to_string(),
            duration_minutes: 3,
        }
        .resolved_against("https://media.example.com/lectures/GenerateVideoSource.mpd");

        assert_eq!(
            descriptor.video_init_url,
            "https://media.example.com/lectures/v/init.mp4"
        );
        assert_eq!(
            descriptor.video_media_template,
            "https://media.example.com/lectures/v/seg-$Number$.m4s"
        );
        assert_eq!(descriptor.audio_init_url, "https://cdn.example.com/a/init.mp4");
        assert_eq!(
            descriptor.audio_media_template,
            "https://media.example.com/a/seg-$Number$.m4s"
        );
    }
}
