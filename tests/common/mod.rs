//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires in-process [`MockSource`] and
//! [`MockMuxer`] capabilities into a full [`AppContext`] whose workspaces live
//! under a private temp root. [`TestHarness::with_server`] starts Axum on a
//! random port for HTTP-level testing.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tm_core::config::Config;
use tm_core::{MuxRequest, Muxer, SourceListing, StreamSource, StreamVariant};
use tm_pipeline::Pipeline;
use tm_server::context::AppContext;
use tm_server::router::build_router;

/// Deterministic file contents for a variant.
pub fn payload(id: &str, len: usize) -> Vec<u8> {
    id.bytes().cycle().take(len).collect()
}

/// Source that serves a fixed listing and writes [`payload`] files.
pub struct MockSource {
    pub title: String,
    pub variants: Vec<StreamVariant>,
    pub payload_len: usize,
    pub failing: HashSet<String>,
    pub fetches: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new(title: &str, variants: Vec<StreamVariant>) -> Self {
        Self {
            title: title.into(),
            variants,
            payload_len: 1024,
            failing: HashSet::new(),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(id.into());
        self
    }

    pub fn with_payload_len(mut self, len: usize) -> Self {
        self.payload_len = len;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl StreamSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list_variants(&self, _url: &str) -> tm_core::Result<SourceListing> {
        Ok(SourceListing {
            title: self.title.clone(),
            variants: self.variants.clone(),
        })
    }

    async fn fetch(
        &self,
        _url: &str,
        variant: &StreamVariant,
        destination: &Path,
    ) -> tm_core::Result<()> {
        self.fetches.lock().unwrap().push(variant.id.clone());
        if self.failing.contains(&variant.id) {
            return Err(tm_core::Error::tool("mock", "HTTP Error 403: Forbidden"));
        }
        tokio::fs::write(destination, payload(&variant.id, self.payload_len)).await?;
        Ok(())
    }
}

/// Muxer that concatenates its inputs, or fails on demand.
#[derive(Default)]
pub struct MockMuxer {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl MockMuxer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Muxer for MockMuxer {
    fn name(&self) -> &'static str {
        "mock-mux"
    }

    async fn combine(&self, request: &MuxRequest) -> tm_core::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            // Leave a partial file behind like a crashed encoder would.
            tokio::fs::write(&request.output, b"partial").await?;
            return Err(tm_core::Error::Mux("Invalid data found when processing input".into()));
        }
        let mut bytes = tokio::fs::read(&request.video).await?;
        bytes.extend(tokio::fs::read(&request.audio).await?);
        tokio::fs::write(&request.output, bytes).await?;
        Ok(())
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`] backed by mocks.
pub struct TestHarness {
    pub ctx: AppContext,
    pub source: Arc<MockSource>,
    pub muxer: Arc<MockMuxer>,
    root: tempfile::TempDir,
}

impl TestHarness {
    pub fn new(source: MockSource, muxer: MockMuxer) -> Self {
        Self::with_config(source, muxer, Config::default())
    }

    /// Create a harness with a custom configuration. The workspace root is
    /// always redirected into a private temp dir.
    pub fn with_config(source: MockSource, muxer: MockMuxer, mut config: Config) -> Self {
        let root = tempfile::tempdir().expect("failed to create temp root");
        config.workspace.root = Some(root.path().join("workspaces"));
        config.retry.max_retries = 0;

        let source = Arc::new(source);
        let muxer = Arc::new(muxer);
        let pipeline = Pipeline::new(source.clone(), muxer.clone(), &config);
        let ctx = AppContext::new(config, pipeline, Vec::new());

        Self {
            ctx,
            source,
            muxer,
            root,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server(source: MockSource, muxer: MockMuxer) -> (Self, SocketAddr) {
        Self::with_server_config(source, muxer, Config::default()).await
    }

    pub async fn with_server_config(
        source: MockSource,
        muxer: MockMuxer,
        config: Config,
    ) -> (Self, SocketAddr) {
        let harness = Self::with_config(source, muxer, config);
        let app = build_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.root.path().join("workspaces")
    }

    /// Number of request workspaces currently on disk.
    pub fn live_workspaces(&self) -> usize {
        std::fs::read_dir(self.workspace_root())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Poll until every workspace is gone, for up to five seconds.
    pub async fn wait_for_cleanup(&self) -> bool {
        for _ in 0..100 {
            if self.live_workspaces() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.live_workspaces() == 0
    }
}

/// `GET /download` URL for the given video URL.
pub fn download_url(addr: SocketAddr, video_url: &str) -> String {
    format!(
        "http://{addr}/download?youtube_url={}",
        urlencoding::encode(video_url)
    )
}
