//! # tm-pipeline
//!
//! Per-request orchestration of the acquire → merge → deliver pipeline.
//!
//! This crate provides:
//!
//! - **[`select_variants`]** -- deterministic choice between a combined
//!   variant and a video-only + audio-only pair.
//! - **[`retry_with_backoff`]** -- bounded exponential backoff around
//!   metadata and download calls.
//! - **[`Pipeline`]** -- drives one request through
//!   `Resolving → Downloading → [Muxing] → Delivering`, releasing the request
//!   workspace on every failure path and handing a [`PreparedDownload`] to
//!   the delivery layer on success.
//! - **[`StageReporter`]** -- callback for observing stage transitions.

pub mod pipeline;
pub mod retry;
pub mod selector;
pub mod stage;

// Re-export key types at the crate root.
pub use pipeline::{
    validate_url, ArtifactOrigin, DownloadedAsset, OutputArtifact, Pipeline, PreparedDownload,
};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use selector::{select_variants, Selection, SelectionPolicy};
pub use stage::{PipelineStage, StageReporter};
