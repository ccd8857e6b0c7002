//! Media-domain types: containers, variant kinds, and the variant descriptors
//! a stream source reports.
//!
//! Enums serialize in lowercase and implement `Display` manually for
//! consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// Container format of a source variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    M4a,
    Webm,
    Other,
}

impl Container {
    /// Map a file extension (as reported by the source) to a container.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" | "m4v" => Self::Mp4,
            "m4a" => Self::M4a,
            "webm" | "weba" => Self::Webm,
            _ => Self::Other,
        }
    }

    /// File extension used when storing a variant of this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::M4a => "m4a",
            Self::Webm => "webm",
            Self::Other => "bin",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mp4 => write!(f, "mp4"),
            Self::M4a => write!(f, "m4a"),
            Self::Webm => write!(f, "webm"),
            Self::Other => write!(f, "other"),
        }
    }
}

// ---------------------------------------------------------------------------
// VariantKind
// ---------------------------------------------------------------------------

/// What a variant carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantKind {
    /// Video and audio already multiplexed together.
    Combined,
    VideoOnly,
    AudioOnly,
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Combined => write!(f, "combined"),
            Self::VideoOnly => write!(f, "video-only"),
            Self::AudioOnly => write!(f, "audio-only"),
        }
    }
}

// ---------------------------------------------------------------------------
// StreamVariant
// ---------------------------------------------------------------------------

/// Immutable descriptor of one variant offered by a stream source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamVariant {
    /// Source-specific identifier used to fetch this variant.
    pub id: String,
    pub kind: VariantKind,
    pub container: Container,
    /// Vertical resolution in pixels; `None` for audio-only variants.
    pub height: Option<u32>,
    pub has_audio: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    /// Average total bitrate in kbit/s, when the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
}

impl StreamVariant {
    /// A combined (video+audio) variant.
    pub fn combined(id: impl Into<String>, container: Container, height: u32) -> Self {
        Self {
            id: id.into(),
            kind: VariantKind::Combined,
            container,
            height: Some(height),
            has_audio: true,
            video_codec: None,
            audio_codec: None,
            bitrate_kbps: None,
        }
    }

    /// A video-only variant.
    pub fn video_only(id: impl Into<String>, container: Container, height: u32) -> Self {
        Self {
            id: id.into(),
            kind: VariantKind::VideoOnly,
            container,
            height: Some(height),
            has_audio: false,
            video_codec: None,
            audio_codec: None,
            bitrate_kbps: None,
        }
    }

    /// An audio-only variant.
    pub fn audio_only(id: impl Into<String>, container: Container) -> Self {
        Self {
            id: id.into(),
            kind: VariantKind::AudioOnly,
            container,
            height: None,
            has_audio: true,
            video_codec: None,
            audio_codec: None,
            bitrate_kbps: None,
        }
    }

    /// Builder: set the bitrate.
    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }

    /// Builder: set the codecs.
    pub fn with_codecs(mut self, video: Option<&str>, audio: Option<&str>) -> Self {
        self.video_codec = video.map(String::from);
        self.audio_codec = audio.map(String::from);
        self
    }

    /// File name under which this variant is stored inside a workspace.
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.container.extension())
    }
}

impl fmt::Display for StreamVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {}", self.id, self.kind, self.container)?;
        if let Some(h) = self.height {
            write!(f, " {h}p")?;
        }
        write!(f, ")")
    }
}

// ---------------------------------------------------------------------------
// SourceListing
// ---------------------------------------------------------------------------

/// Everything a stream source reports about one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceListing {
    /// Human-readable title, used to name the delivered file.
    pub title: String,
    pub variants: Vec<StreamVariant>,
}
