//! Per-request pipeline: resolve, download, mux, and hand off for delivery.
//!
//! [`Pipeline::prepare`] drives one request through
//! `Resolving → Downloading → [Muxing] → Delivering`. On success it returns a
//! [`PreparedDownload`] that owns the request workspace; the caller streams
//! the artifact and then calls [`PreparedDownload::finish`] (or simply drops
//! it) to run the `Cleanup` stage. On failure the workspace has already been
//! released by the time the error is returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tm_av::RequestWorkspace;
use tm_core::config::{Config, MuxConfig, WorkspaceConfig};
use tm_core::{AssetRole, MuxRequest, Muxer, RequestId, StreamSource, StreamVariant};
use tokio_util::sync::CancellationToken;

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::selector::{select_variants, Selection, SelectionPolicy};
use crate::stage::{PipelineStage, StageReporter};

/// File name of the muxer output inside a workspace.
const MUXED_FILE_NAME: &str = "final.mp4";

/// A fetched variant sitting in the request workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAsset {
    pub path: PathBuf,
    pub variant: StreamVariant,
    pub role: AssetRole,
}

/// How an [`OutputArtifact`] came to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOrigin {
    /// A combined variant delivered as downloaded.
    Direct(StreamVariant),
    /// Produced by muxing a video-only and an audio-only variant.
    Muxed {
        video: StreamVariant,
        audio: StreamVariant,
    },
}

/// The single file delivered for a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub path: PathBuf,
    /// Display title reported by the source; may be empty.
    pub title: String,
    pub origin: ArtifactOrigin,
}

/// Hand-off from the pipeline to the delivery layer.
///
/// Owns the request workspace. Dropping it removes the workspace; calling
/// [`finish`](Self::finish) does the same and also reports the final stage.
#[derive(Debug)]
pub struct PreparedDownload {
    pub artifact: OutputArtifact,
    workspace: RequestWorkspace,
    reporter: Arc<StageReporter>,
}

impl PreparedDownload {
    pub fn request_id(&self) -> RequestId {
        self.workspace.request_id()
    }

    /// Directory holding the artifact.
    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    /// Run the `Cleanup` stage and report `Done` or `Failed`.
    pub fn finish(self, delivered: bool) {
        let request_id = self.workspace.request_id();
        self.reporter.enter(request_id, PipelineStage::Cleanup);
        self.workspace.release();
        let terminal = if delivered {
            PipelineStage::Done
        } else {
            PipelineStage::Failed
        };
        self.reporter.enter(request_id, terminal);
    }
}

/// Stateless orchestrator shared by all requests.
pub struct Pipeline {
    source: Arc<dyn StreamSource>,
    muxer: Arc<dyn Muxer>,
    selection: SelectionPolicy,
    mux: MuxConfig,
    workspace: WorkspaceConfig,
    retry: RetryPolicy,
    reporter: Arc<StageReporter>,
    shutdown: CancellationToken,
}

impl Pipeline {
    /// Build a pipeline from the given capabilities and configuration.
    pub fn new(source: Arc<dyn StreamSource>, muxer: Arc<dyn Muxer>, config: &Config) -> Self {
        Self {
            source,
            muxer,
            selection: SelectionPolicy::from(&config.selection),
            mux: config.mux.clone(),
            workspace: config.workspace.clone(),
            retry: RetryPolicy::from(&config.retry),
            reporter: Arc::new(StageReporter::noop()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the stage reporter.
    pub fn with_reporter(mut self, reporter: StageReporter) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Use `token` to abort pending retry backoffs on shutdown.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub fn muxer_name(&self) -> &'static str {
        self.muxer.name()
    }

    /// Run the pipeline up to the point where the artifact is ready.
    ///
    /// # Errors
    ///
    /// Any taxonomy error from validation, the source, selection, download,
    /// or mux. The workspace is released before the error is returned.
    pub async fn prepare(
        &self,
        request_id: RequestId,
        url: &str,
    ) -> tm_core::Result<PreparedDownload> {
        self.reporter.enter(request_id, PipelineStage::Resolving);

        let (title, selection) = match self.resolve(url).await {
            Ok(resolved) => resolved,
            Err(e) => return Err(self.fail(request_id, None, e)),
        };

        let workspace = match RequestWorkspace::acquire(&self.workspace, request_id) {
            Ok(ws) => ws,
            Err(e) => return Err(self.fail(request_id, None, e)),
        };

        match self.materialize(&workspace, url.trim(), title, selection).await {
            Ok(artifact) => {
                self.reporter.enter(request_id, PipelineStage::Delivering);
                Ok(PreparedDownload {
                    artifact,
                    workspace,
                    reporter: self.reporter.clone(),
                })
            }
            Err(e) => Err(self.fail(request_id, Some(workspace), e)),
        }
    }

    /// Run the pipeline and copy the artifact to `destination`.
    ///
    /// Returns the number of bytes written. The workspace is released
    /// whether or not the copy succeeds.
    pub async fn fetch_to(&self, url: &str, destination: &Path) -> tm_core::Result<u64> {
        let prepared = self.prepare(RequestId::new(), url).await?;
        let copied = tokio::fs::copy(&prepared.artifact.path, destination)
            .await
            .map_err(tm_core::Error::from);
        prepared.finish(copied.is_ok());
        copied
    }

    async fn resolve(&self, url: &str) -> tm_core::Result<(String, Selection)> {
        let url = validate_url(url)?;

        let listing = retry_with_backoff(&self.retry, &self.shutdown, "list variants", |_| {
            self.source.list_variants(url)
        })
        .await
        .map_err(|e| match e {
            tm_core::Error::SourceUnavailable(_) => e,
            other => tm_core::Error::SourceUnavailable(other.to_string()),
        })?;

        if listing.variants.is_empty() {
            return Err(tm_core::Error::SourceUnavailable(format!(
                "{} reported no variants for {url}",
                self.source.name()
            )));
        }

        let selection = select_variants(&listing.variants, &self.selection)?;
        tracing::debug!(title = %listing.title, "selected {selection:?}");
        Ok((listing.title, selection))
    }

    async fn materialize(
        &self,
        workspace: &RequestWorkspace,
        url: &str,
        title: String,
        selection: Selection,
    ) -> tm_core::Result<OutputArtifact> {
        let request_id = workspace.request_id();
        self.reporter.enter(request_id, PipelineStage::Downloading);

        match selection {
            Selection::Combined(variant) => {
                let path = workspace.path_for(&variant.file_name("combined"))?;
                let asset = self
                    .download(url, &variant, AssetRole::Combined, path)
                    .await?;
                Ok(OutputArtifact {
                    path: asset.path,
                    title,
                    origin: ArtifactOrigin::Direct(asset.variant),
                })
            }
            Selection::Split { video, audio } => {
                let video_path = workspace.path_for(&video.file_name("video"))?;
                let audio_path = workspace.path_for(&audio.file_name("audio"))?;

                // Dropping the losing future kills its child process.
                let (video, audio) = tokio::try_join!(
                    self.download(url, &video, AssetRole::Video, video_path),
                    self.download(url, &audio, AssetRole::Audio, audio_path),
                )?;

                self.reporter.enter(request_id, PipelineStage::Muxing);
                let output = workspace.path_for(MUXED_FILE_NAME)?;
                self.mux(&video, &audio, &output).await?;

                Ok(OutputArtifact {
                    path: output,
                    title,
                    origin: ArtifactOrigin::Muxed {
                        video: video.variant,
                        audio: audio.variant,
                    },
                })
            }
        }
    }

    async fn download(
        &self,
        url: &str,
        variant: &StreamVariant,
        role: AssetRole,
        destination: PathBuf,
    ) -> tm_core::Result<DownloadedAsset> {
        let dest = destination.as_path();
        let op_name = format!("{role} download");

        retry_with_backoff(&self.retry, &self.shutdown, &op_name, |attempt| async move {
            if attempt > 0 {
                remove_partial(dest).await;
            }
            self.source.fetch(url, variant, dest).await?;
            match tokio::fs::metadata(dest).await {
                Ok(meta) if meta.len() > 0 => Ok(()),
                _ => Err(tm_core::Error::download(
                    role,
                    format!("fetch of {variant} reported success but left no file"),
                )),
            }
        })
        .await
        .map_err(|e| match e {
            tm_core::Error::Download { .. } => e,
            other => tm_core::Error::download(role, other),
        })?;

        tracing::debug!("downloaded {role} asset {variant} to {}", dest.display());
        Ok(DownloadedAsset {
            path: destination,
            variant: variant.clone(),
            role,
        })
    }

    async fn mux(
        &self,
        video: &DownloadedAsset,
        audio: &DownloadedAsset,
        output: &Path,
    ) -> tm_core::Result<()> {
        let request = MuxRequest {
            video: video.path.clone(),
            audio: audio.path.clone(),
            output: output.to_path_buf(),
            video_codec: self.mux.video_codec.clone(),
            audio_codec: self.mux.audio_codec.clone(),
        };

        self.muxer.combine(&request).await.map_err(|e| match e {
            tm_core::Error::Mux(_) => e,
            other => tm_core::Error::Mux(other.to_string()),
        })?;

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(tm_core::Error::Mux(format!(
                "{} produced no output at {}",
                self.muxer.name(),
                output.display()
            ))),
        }
    }

    fn fail(
        &self,
        request_id: RequestId,
        workspace: Option<RequestWorkspace>,
        err: tm_core::Error,
    ) -> tm_core::Error {
        tracing::debug!(request_id = %request_id, code = err.code(), "pipeline failed: {err}");
        self.reporter.enter(request_id, PipelineStage::Cleanup);
        if let Some(ws) = workspace {
            ws.release();
        }
        self.reporter.enter(request_id, PipelineStage::Failed);
        err
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source.name())
            .field("muxer", &self.muxer.name())
            .field("selection", &self.selection)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Check that `raw` is a non-empty absolute http(s) URL.
///
/// Returns the trimmed input on success.
pub fn validate_url(raw: &str) -> tm_core::Result<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(tm_core::Error::InvalidRequest(
            "YouTube URL is required".into(),
        ));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| tm_core::Error::InvalidRequest(format!("malformed URL {trimmed:?}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(trimmed),
        scheme => Err(tm_core::Error::InvalidRequest(format!(
            "unsupported URL scheme {scheme:?}; expected http or https"
        ))),
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("removed partial download {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("failed to remove partial download {}: {e}", path.display()),
    }
}
