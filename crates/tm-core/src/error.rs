//! Unified error type for tubemux.
//!
//! Every pipeline stage funnels its failures into [`Error`], which carries
//! enough context for the HTTP layer to derive a status code via
//! [`Error::http_status`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which downloaded asset a [`Error::Download`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetRole {
    Combined,
    Video,
    Audio,
}

impl fmt::Display for AssetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Combined => write!(f, "combined"),
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Unified error type covering all failure modes in tubemux.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request was missing a URL or carried a malformed one.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The selector found no usable combination of variants.
    #[error("No viable stream: {0}")]
    NoViableStream(String),

    /// The stream source could not be reached or reported nothing.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source answered but refused the URL (unsupported site, removed or
    /// private video). Retrying cannot help.
    #[error("Source rejected: {0}")]
    SourceRejected(String),

    /// Fetching one of the selected variants failed.
    #[error("Download error [{asset}]: {message}")]
    Download {
        /// The asset whose fetch failed.
        asset: AssetRole,
        /// Human-readable error description.
        message: String,
    },

    /// Combining the video and audio assets failed.
    #[error("Mux error: {0}")]
    Mux(String),

    /// Removing a request workspace failed. Logged, never sent to callers.
    #[error("Cleanup error [{}]: {message}", path.display())]
    Cleanup {
        /// Workspace directory that could not be removed.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// An external tool (ffmpeg, yt-dlp) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidRequest(_) => 400,
            Error::NoViableStream(_) => 404,
            Error::SourceUnavailable(_) => 500,
            Error::SourceRejected(_) => 500,
            Error::Download { .. } => 500,
            Error::Mux(_) => 500,
            Error::Cleanup { .. } => 500,
            Error::Tool { .. } => 500,
            Error::Io { .. } => 500,
            Error::Config(_) => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::NoViableStream(_) => "no_viable_stream",
            Error::SourceUnavailable(_) => "source_unavailable",
            Error::SourceRejected(_) => "source_rejected",
            Error::Download { .. } => "download_error",
            Error::Mux(_) => "mux_error",
            Error::Cleanup { .. } => "cleanup_error",
            Error::Tool { .. } => "tool_error",
            Error::Io { .. } => "io_error",
            Error::Config(_) => "config_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether a retry of the same operation might succeed.
    ///
    /// Only network- and process-level failures qualify; selection and
    /// validation failures are deterministic.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::SourceUnavailable(_)
                | Error::Download { .. }
                | Error::Tool { .. }
                | Error::Io { .. }
        )
    }

    /// Convenience constructor for [`Error::Download`].
    pub fn download(asset: AssetRole, message: impl fmt::Display) -> Self {
        Error::Download {
            asset,
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Cleanup`].
    pub fn cleanup(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Error::Cleanup {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
