//! # tm-av
//!
//! External tool management and the concrete collaborators of the download
//! pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and yt-dlp.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Workspace management** ([`RequestWorkspace`]) -- per-request temporary
//!   directory that is removed on every exit path.
//! - **Muxing** ([`FfmpegMuxer`]) -- implements [`tm_core::Muxer`] by
//!   shelling out to ffmpeg.
//! - **Stream source** ([`YtDlpSource`]) -- implements
//!   [`tm_core::StreamSource`] by shelling out to yt-dlp.

pub mod command;
pub mod muxer;
pub mod tools;
pub mod workspace;
pub mod ytdlp;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use muxer::FfmpegMuxer;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::RequestWorkspace;
pub use ytdlp::YtDlpSource;
