//! Application context shared across route handlers via Axum state.

use std::sync::Arc;

use tm_av::ToolInfo;
use tm_core::config::Config;
use tm_pipeline::Pipeline;

/// Central state for the HTTP layer.
///
/// Everything here is immutable after startup; per-request state lives in
/// the pipeline's workspace handles.
#[derive(Clone, Debug)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
    /// Tool availability captured at startup, reported by `/health`.
    pub tools: Arc<Vec<ToolInfo>>,
}

impl AppContext {
    pub fn new(config: Config, pipeline: Pipeline, tools: Vec<ToolInfo>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            tools: Arc::new(tools),
        }
    }
}
