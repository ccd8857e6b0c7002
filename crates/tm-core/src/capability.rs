//! Capability traits for the two external collaborators of the pipeline.
//!
//! The pipeline only ever talks to a [`StreamSource`] and a [`Muxer`]
//! through these traits, so tests can swap in in-process mocks for the
//! network client and the codec engine.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::media::{SourceListing, StreamVariant};

/// Resolves and fetches stream variants for a remote video URL.
///
/// Implementations must be safe to share across threads (`Send + Sync`) and
/// must not keep per-request state.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Human-readable name identifying this source implementation.
    fn name(&self) -> &'static str;

    /// List the variants available for `url`, along with the display title.
    ///
    /// An unreachable source should fail with
    /// [`Error::SourceUnavailable`](crate::Error::SourceUnavailable); a URL
    /// the source will never serve with
    /// [`Error::SourceRejected`](crate::Error::SourceRejected).
    async fn list_variants(&self, url: &str) -> Result<SourceListing>;

    /// Download `variant` of `url` into `destination`.
    ///
    /// The file at `destination` must be complete when this returns `Ok`.
    async fn fetch(&self, url: &str, variant: &StreamVariant, destination: &Path) -> Result<()>;
}

/// Input and output paths for one mux operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxRequest {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
    /// Encoder for the video stream (`copy` to pass it through).
    pub video_codec: String,
    /// Encoder for the audio stream (`copy` to pass it through).
    pub audio_codec: String,
}

/// Combines a video-only file and an audio-only file into one container.
#[async_trait]
pub trait Muxer: Send + Sync {
    /// Human-readable name identifying this muxer implementation.
    fn name(&self) -> &'static str;

    /// Write a file at `request.output` holding the synchronized streams.
    ///
    /// Failures should be reported as [`Error::Mux`](crate::Error::Mux) and
    /// must not leave a partial output file behind.
    async fn combine(&self, request: &MuxRequest) -> Result<()>;
}
