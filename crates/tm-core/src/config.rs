//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, tools, variant selection, muxing, workspaces,
//! delivery, and retry. Every section defaults sensibly so a completely empty
//! `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub selection: SelectionConfig,
    pub mux: MuxConfig,
    pub workspace: WorkspaceConfig,
    pub delivery: DeliveryConfig,
    pub retry: RetryConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("parse error: {e}")))
    }

    /// Load configuration from a file path, failing if it cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.delivery.chunk_size == 0 {
            warnings.push("delivery.chunk_size is 0; the default of 64 KiB will be used".into());
        }

        if let Some(max) = self.selection.max_video_height {
            if max < self.selection.min_combined_height {
                warnings.push(format!(
                    "selection.max_video_height ({max}) is below min_combined_height ({})",
                    self.selection.min_combined_height
                ));
            }
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            warnings.push("retry.base_delay_ms exceeds retry.max_delay_ms".into());
        }

        if let Some(ref root) = self.workspace.root {
            if !root.is_dir() {
                warnings.push(format!(
                    "workspace.root {} does not exist; it will be created on first use",
                    root.display()
                ));
            }
        }

        if self.mux.video_codec.trim().is_empty() || self.mux.audio_codec.trim().is_empty() {
            warnings.push("mux codecs must not be empty".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
    /// Maximum runtime of a single tool invocation.
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

fn default_tool_timeout() -> u64 {
    1800
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ytdlp_path: None,
            timeout_secs: default_tool_timeout(),
        }
    }
}

/// Variant selection policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Smallest combined-variant height that is delivered as-is.
    #[serde(default = "default_min_combined_height")]
    pub min_combined_height: u32,
    /// Cap for video-only variants in the split path (`None` = no cap).
    #[serde(default = "default_max_video_height")]
    pub max_video_height: Option<u32>,
}

fn default_min_combined_height() -> u32 {
    720
}
fn default_max_video_height() -> Option<u32> {
    Some(1080)
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_combined_height: default_min_combined_height(),
            max_video_height: default_max_video_height(),
        }
    }
}

/// Encoder settings passed to the muxer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
}

fn default_video_codec() -> String {
    "libx264".into()
}
fn default_audio_codec() -> String {
    "aac".into()
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
        }
    }
}

/// Where per-request workspaces are created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory for workspaces; the system temp dir when `None`.
    pub root: Option<PathBuf>,
    #[serde(default = "default_workspace_prefix")]
    pub prefix: String,
}

fn default_workspace_prefix() -> String {
    "tubemux-".into()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            prefix: default_workspace_prefix(),
        }
    }
}

/// Response streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Read size in bytes for each body chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// 64 KiB, matching the direct-stream reader.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Bounded retry for metadata and download calls. Muxing is never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt; `0` disables retrying.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    5000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}
