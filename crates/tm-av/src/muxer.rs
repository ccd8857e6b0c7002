//! Combine separate video and audio files with ffmpeg.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tm_core::{MuxRequest, Muxer};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// [`Muxer`] backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl FfmpegMuxer {
    /// Create a muxer for the given ffmpeg executable.
    pub fn new(ffmpeg: PathBuf, timeout: Duration) -> Self {
        Self { ffmpeg, timeout }
    }

    /// Create a muxer from a discovered tool registry.
    pub fn from_registry(tools: &ToolRegistry) -> tm_core::Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?;
        Ok(Self::new(ffmpeg.path.clone(), ffmpeg.timeout))
    }

    /// Build the ffmpeg invocation for `request`.
    ///
    /// The first video stream of the video input and the first audio stream
    /// of the audio input are mapped into an MP4 with the index moved to the
    /// front so the result starts playing before it is fully downloaded.
    pub fn command(&self, request: &MuxRequest) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.timeout(self.timeout);
        cmd.args(["-y", "-hide_banner", "-loglevel", "error"]);
        cmd.arg("-i").arg(request.video.to_string_lossy().as_ref());
        cmd.arg("-i").arg(request.audio.to_string_lossy().as_ref());
        cmd.args(["-map", "0:v:0", "-map", "1:a:0"]);
        cmd.args(["-c:v", request.video_codec.as_str()]);
        cmd.args(["-c:a", request.audio_codec.as_str()]);
        cmd.args(["-shortest", "-movflags", "+faststart", "-f", "mp4"]);
        cmd.arg(request.output.to_string_lossy().as_ref());
        cmd
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn combine(&self, request: &MuxRequest) -> tm_core::Result<()> {
        tracing::info!(
            "mux {:?} + {:?} -> {:?} (video {}, audio {})",
            request.video,
            request.audio,
            request.output,
            request.video_codec,
            request.audio_codec
        );

        if let Err(e) = self.command(request).execute().await {
            // Drop any half-written container.
            match tokio::fs::remove_file(&request.output).await {
                Ok(()) => tracing::debug!("removed partial mux output {:?}", request.output),
                Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                Err(rm) => tracing::warn!("failed to remove partial mux output: {rm}"),
            }
            return Err(tm_core::Error::Mux(e.to_string()));
        }

        match tokio::fs::metadata(&request.output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            Ok(_) => Err(tm_core::Error::Mux("ffmpeg produced an empty file".into())),
            Err(e) => Err(tm_core::Error::Mux(format!("ffmpeg produced no output: {e}"))),
        }
    }
}
