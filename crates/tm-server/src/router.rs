//! Axum router construction.

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/download", get(routes::download::download))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tm_core::config::Config;
    use tm_core::{MuxRequest, Muxer, SourceListing, StreamSource, StreamVariant};
    use tm_pipeline::Pipeline;
    use tower::ServiceExt;

    struct DownSource;

    #[async_trait]
    impl StreamSource for DownSource {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn list_variants(&self, _url: &str) -> tm_core::Result<SourceListing> {
            Err(tm_core::Error::SourceUnavailable("offline".into()))
        }

        async fn fetch(&self, _: &str, _: &StreamVariant, _: &Path) -> tm_core::Result<()> {
            Err(tm_core::Error::SourceUnavailable("offline".into()))
        }
    }

    struct NoMux;

    #[async_trait]
    impl Muxer for NoMux {
        fn name(&self) -> &'static str {
            "none"
        }

        async fn combine(&self, _: &MuxRequest) -> tm_core::Result<()> {
            Err(tm_core::Error::Mux("unused".into()))
        }
    }

    fn app() -> Router {
        let mut config = Config::default();
        config.retry.max_retries = 0;
        let pipeline = Pipeline::new(Arc::new(DownSource), Arc::new(NoMux), &config);
        build_router(AppContext::new(config, pipeline, Vec::new()))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["source"], "down");
    }

    #[tokio::test]
    async fn missing_url_is_400_with_request_id() {
        let response = app()
            .oneshot(Request::get("/download").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let header_id = response.headers()["x-request-id"]
            .to_str()
            .unwrap()
            .to_string();
        let body = json_body(response).await;
        assert_eq!(body["code"], "invalid_request");
        assert_eq!(body["request_id"], header_id.as_str());
    }

    #[tokio::test]
    async fn client_request_id_is_echoed() {
        let id = tm_core::RequestId::new().to_string();
        let response = app()
            .oneshot(
                Request::get("/download?url=not-a-url")
                    .header("x-request-id", &id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-request-id"], id.as_str());
    }

    #[tokio::test]
    async fn unreachable_source_is_500() {
        let response = app()
            .oneshot(
                Request::get("/download?youtube_url=https%3A%2F%2Fyoutu.be%2Fabc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["code"], "source_unavailable");
    }
}
