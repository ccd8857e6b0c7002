//! [`StreamSource`] backed by the yt-dlp CLI.
//!
//! Variant discovery runs `yt-dlp --dump-single-json` and maps the reported
//! formats onto [`StreamVariant`]s; fetching runs yt-dlp again with a single
//! `-f <format_id>` selector and a fixed output path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tm_core::{Container, SourceListing, StreamSource, StreamVariant, VariantKind};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Source that resolves and downloads variants through yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpSource {
    ytdlp: PathBuf,
    timeout: Duration,
}

impl YtDlpSource {
    /// Create a source for the given yt-dlp executable.
    pub fn new(ytdlp: PathBuf, timeout: Duration) -> Self {
        Self { ytdlp, timeout }
    }

    /// Create a source from a discovered tool registry.
    pub fn from_registry(tools: &ToolRegistry) -> tm_core::Result<Self> {
        let ytdlp = tools.require("yt-dlp")?;
        Ok(Self::new(ytdlp.path.clone(), ytdlp.timeout))
    }

    fn base_command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ytdlp.clone());
        cmd.timeout(self.timeout);
        cmd.args(["--no-playlist", "--no-warnings", "--quiet"]);
        cmd
    }
}

#[async_trait]
impl StreamSource for YtDlpSource {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn list_variants(&self, url: &str) -> tm_core::Result<SourceListing> {
        let mut cmd = self.base_command();
        cmd.arg("--dump-single-json").arg(url);

        let output = cmd
            .execute()
            .await
            .map_err(classify_listing_error)?;

        let listing = parse_listing(&output.stdout)?;
        tracing::debug!(
            "yt-dlp reported {} usable formats for {url}",
            listing.variants.len()
        );
        Ok(listing)
    }

    async fn fetch(
        &self,
        url: &str,
        variant: &StreamVariant,
        destination: &Path,
    ) -> tm_core::Result<()> {
        let mut cmd = self.base_command();
        cmd.args(["--no-part", "--force-overwrites"]);
        cmd.arg("-f").arg(variant.id.as_str());
        cmd.arg("-o").arg(output_template(destination));
        cmd.arg(url);
        cmd.execute().await?;

        // yt-dlp exits 0 for some skipped downloads; trust the filesystem.
        match tokio::fs::metadata(destination).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            Ok(_) => Err(tm_core::Error::tool("yt-dlp", "downloaded file is empty")),
            Err(e) => Err(tm_core::Error::tool(
                "yt-dlp",
                format!("no file at {}: {e}", destination.display()),
            )),
        }
    }
}

/// yt-dlp error messages that no retry will change.
const PERMANENT_ERRORS: &[&str] = &[
    "Unsupported URL",
    "is not a valid URL",
    "Video unavailable",
    "Private video",
    "This video has been removed",
    "This video is not available",
    "Sign in to confirm your age",
    "members-only",
];

/// Map a failed metadata run onto the error taxonomy.
///
/// A non-zero exit whose `ERROR:` line names a permanent condition becomes
/// [`tm_core::Error::SourceRejected`]; everything else (network trouble,
/// timeouts, a missing binary) stays retryable.
fn classify_listing_error(err: tm_core::Error) -> tm_core::Error {
    let message = err.to_string();
    let permanent = message
        .split(" | ")
        .filter_map(|line| line.split_once("ERROR:").map(|(_, rest)| rest))
        .any(|line| PERMANENT_ERRORS.iter().any(|p| line.contains(p)));

    if permanent {
        tm_core::Error::SourceRejected(message)
    } else {
        tm_core::Error::SourceUnavailable(message)
    }
}

/// yt-dlp treats `-o` as a template; escape `%` so the path is used verbatim.
fn output_template(destination: &Path) -> String {
    destination.to_string_lossy().replace('%', "%%")
}

// ---------------------------------------------------------------------------
// JSON parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    tbr: Option<f64>,
}

/// Parse the output of `yt-dlp --dump-single-json` into a listing.
///
/// Formats that carry neither video nor audio (storyboards) are dropped.
/// A missing or empty `formats` array is reported as
/// [`tm_core::Error::SourceUnavailable`].
pub fn parse_listing(json: &str) -> tm_core::Result<SourceListing> {
    let info: RawInfo = serde_json::from_str(json).map_err(|e| {
        tm_core::Error::SourceUnavailable(format!("unreadable yt-dlp metadata: {e}"))
    })?;

    let variants: Vec<StreamVariant> = info.formats.into_iter().filter_map(to_variant).collect();
    if variants.is_empty() {
        return Err(tm_core::Error::SourceUnavailable(
            "source reported no downloadable formats".into(),
        ));
    }

    Ok(SourceListing {
        title: info.title.unwrap_or_default(),
        variants,
    })
}

fn to_variant(raw: RawFormat) -> Option<StreamVariant> {
    let has_video = match raw.vcodec.as_deref() {
        Some("none") => false,
        Some(_) => true,
        None => raw.height.is_some(),
    };
    let has_audio = match raw.acodec.as_deref() {
        Some("none") => false,
        Some(_) => true,
        // Generic extractors omit codecs for plain media files.
        None => has_video,
    };

    let kind = match (has_video, has_audio) {
        (true, true) => VariantKind::Combined,
        (true, false) => VariantKind::VideoOnly,
        (false, true) => VariantKind::AudioOnly,
        (false, false) => return None,
    };

    let codec = |c: Option<String>| c.filter(|c| c != "none");

    Some(StreamVariant {
        id: raw.format_id,
        kind,
        container: Container::from_extension(raw.ext.as_deref().unwrap_or("")),
        height: if has_video { raw.height } else { None },
        has_audio,
        video_codec: codec(raw.vcodec),
        audio_codec: codec(raw.acodec),
        bitrate_kbps: raw.tbr.map(|t| t.round().max(0.0) as u32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "abc123",
        "title": "Café \"Live\" Session",
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none"},
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "tbr": 129.5},
            {"format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus", "tbr": 135.0},
            {"format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "tbr": 500.0},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "tbr": 4000.2},
            {"format_id": "248", "ext": "webm", "vcodec": "vp9", "acodec": "none", "height": 1080, "tbr": 2600.0}
        ]
    }"#;

    #[test]
    fn parses_title_and_variants() {
        let listing = parse_listing(SAMPLE).unwrap();
        assert_eq!(listing.title, "Café \"Live\" Session");
        // The storyboard is dropped.
        assert_eq!(listing.variants.len(), 5);
        assert!(listing.variants.iter().all(|v| v.id != "sb0"));
    }

    #[test]
    fn classifies_variant_kinds() {
        let listing = parse_listing(SAMPLE).unwrap();
        let by_id = |id: &str| listing.variants.iter().find(|v| v.id == id).unwrap();

        let audio = by_id("140");
        assert_eq!(audio.kind, VariantKind::AudioOnly);
        assert_eq!(audio.container, Container::M4a);
        assert_eq!(audio.height, None);
        assert_eq!(audio.bitrate_kbps, Some(130));
        assert_eq!(audio.video_codec, None);

        let combined = by_id("18");
        assert_eq!(combined.kind, VariantKind::Combined);
        assert_eq!(combined.height, Some(360));
        assert!(combined.has_audio);

        let video = by_id("137");
        assert_eq!(video.kind, VariantKind::VideoOnly);
        assert!(!video.has_audio);
        assert_eq!(video.video_codec.as_deref(), Some("avc1.640028"));
    }

    #[test]
    fn generic_format_without_codecs_is_combined() {
        let json = r#"{"title": "clip", "formats": [{"format_id": "0", "ext": "mp4", "height": 720}]}"#;
        let listing = parse_listing(json).unwrap();
        assert_eq!(listing.variants[0].kind, VariantKind::Combined);
    }

    #[test]
    fn missing_title_is_empty() {
        let json = r#"{"formats": [{"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "aac"}]}"#;
        let listing = parse_listing(json).unwrap();
        assert_eq!(listing.title, "");
    }

    #[test]
    fn no_formats_is_source_unavailable() {
        let err = parse_listing(r#"{"title": "x", "formats": []}"#).unwrap_err();
        assert!(matches!(err, tm_core::Error::SourceUnavailable(_)));

        let err = parse_listing(r#"{"title": "x"}"#).unwrap_err();
        assert!(matches!(err, tm_core::Error::SourceUnavailable(_)));
    }

    #[test]
    fn garbage_is_source_unavailable() {
        let err = parse_listing("ERROR: Unsupported URL").unwrap_err();
        assert!(matches!(err, tm_core::Error::SourceUnavailable(_)));
    }

    #[test]
    fn permanent_ytdlp_errors_are_rejected() {
        let err = classify_listing_error(tm_core::Error::tool(
            "yt-dlp",
            "exited with status exit status: 1: ERROR: [youtube] dQw4w9WgXcQ: Video unavailable",
        ));
        assert!(matches!(err, tm_core::Error::SourceRejected(_)));
        assert!(!err.is_transient());

        let err = classify_listing_error(tm_core::Error::tool(
            "yt-dlp",
            "exited with status exit status: 1: WARNING: x | ERROR: Unsupported URL: https://example.com/",
        ));
        assert!(matches!(err, tm_core::Error::SourceRejected(_)));
    }

    #[test]
    fn network_ytdlp_errors_stay_retryable() {
        let err = classify_listing_error(tm_core::Error::tool(
            "yt-dlp",
            "exited with status exit status: 1: ERROR: [youtube] abc: Unable to download webpage: \
             <urlopen error [Errno -3] Temporary failure in name resolution>",
        ));
        assert!(matches!(err, tm_core::Error::SourceUnavailable(_)));
        assert!(err.is_transient());

        let err = classify_listing_error(tm_core::Error::tool("yt-dlp", "timed out after 30s"));
        assert!(matches!(err, tm_core::Error::SourceUnavailable(_)));
    }

    #[test]
    fn output_template_escapes_percent() {
        assert_eq!(
            output_template(Path::new("/tmp/ws%1/video.mp4")),
            "/tmp/ws%%1/video.mp4"
        );
    }

    #[tokio::test]
    async fn missing_binary_is_source_unavailable() {
        let source = YtDlpSource::new(
            PathBuf::from("nonexistent_ytdlp_xyz_12345"),
            Duration::from_secs(5),
        );
        let err = source
            .list_variants("https://example.com/watch?v=1")
            .await
            .unwrap_err();
        assert!(matches!(err, tm_core::Error::SourceUnavailable(_)));
    }
}
