//! Liveness endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tm_av::ToolInfo;

use crate::context::AppContext;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub source: &'static str,
    pub muxer: &'static str,
    pub tools: Vec<ToolInfo>,
}

/// GET /health
pub async fn health_check(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        source: ctx.pipeline.source_name(),
        muxer: ctx.pipeline.muxer_name(),
        tools: ctx.tools.as_ref().clone(),
    })
}
