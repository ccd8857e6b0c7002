//! The download endpoint.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::Extension;
use serde::Deserialize;
use tm_core::RequestId;

use crate::context::AppContext;
use crate::delivery;
use crate::error::AppError;

/// Query string of `GET /download`.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    #[serde(default, alias = "url")]
    pub youtube_url: Option<String>,
}

/// GET /download?youtube_url=<url>
///
/// Resolves, downloads, and (if needed) muxes the video, then streams it as
/// an mp4 attachment.
pub async fn download(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let fail = |e: tm_core::Error| AppError::new(e).with_request_id(request_id);

    let Query(query) = query
        .map_err(|e| fail(tm_core::Error::InvalidRequest(format!("bad query string: {e}"))))?;
    let url = query.youtube_url.unwrap_or_default();

    tracing::info!(url = %url, "download requested");

    let prepared = ctx.pipeline.prepare(request_id, &url).await.map_err(fail)?;
    delivery::serve_artifact(prepared, ctx.config.delivery.chunk_size)
        .await
        .map_err(fail)
}
