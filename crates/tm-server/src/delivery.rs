//! Streams a prepared artifact to the client.
//!
//! The response body owns the [`PreparedDownload`], and with it the request
//! workspace. The workspace is released as soon as the last chunk has been
//! read, or when the body is dropped early because the client went away.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::Response;
use futures_core::Stream;
use tm_pipeline::PreparedDownload;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// Fallback stem when the source reports no usable title.
const FALLBACK_STEM: &str = "video";

/// File name offered to the client for `title`.
pub fn download_file_name(title: &str) -> String {
    if title.trim().is_empty() {
        format!("{FALLBACK_STEM}.mp4")
    } else {
        format!("{title}.mp4")
    }
}

/// `Content-Disposition` value using the RFC 5987 `filename*` form.
///
/// Everything except RFC 3986 unreserved characters is percent-encoded, so
/// decoding the value yields the exact title.
pub fn content_disposition(title: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&download_file_name(title))
    )
}

/// Build the streaming response for a prepared download.
///
/// On failure the download is finished as not delivered, which releases the
/// workspace before the error is returned.
pub async fn serve_artifact(
    prepared: PreparedDownload,
    chunk_size: usize,
) -> tm_core::Result<Response> {
    let opened = async {
        let file = File::open(&prepared.artifact.path).await?;
        let len = file.metadata().await?.len();
        Ok::<_, io::Error>((file, len))
    }
    .await;

    let (file, len) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            let err = tm_core::Error::Internal(format!(
                "artifact {} unreadable: {e}",
                prepared.artifact.path.display()
            ));
            prepared.finish(false);
            return Err(err);
        }
    };

    let disposition = content_disposition(&prepared.artifact.title);
    tracing::info!(
        request_id = %prepared.request_id(),
        bytes = len,
        "delivering {}",
        download_file_name(&prepared.artifact.title)
    );

    let stream = DeliveryStream::new(
        ReaderStream::with_capacity(file, chunk_size.max(1)),
        prepared,
        len,
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(stream))
        .map_err(|e| tm_core::Error::Internal(format!("failed to build response: {e}")))
}

/// Chunked file stream that owns the request's workspace.
pub struct DeliveryStream {
    inner: ReaderStream<File>,
    prepared: Option<PreparedDownload>,
    sent: u64,
    expected: u64,
}

impl DeliveryStream {
    pub fn new(inner: ReaderStream<File>, prepared: PreparedDownload, expected: u64) -> Self {
        Self {
            inner,
            prepared: Some(prepared),
            sent: 0,
            expected,
        }
    }

    /// Release the workspace exactly once.
    ///
    /// Removal is a synchronous `remove_dir_all` on the calling worker. A
    /// workspace holds at most three files, so it stays off `spawn_blocking`.
    fn finish(&mut self) {
        let Some(prepared) = self.prepared.take() else {
            return;
        };
        let delivered = self.sent >= self.expected;
        if delivered {
            tracing::info!(
                request_id = %prepared.request_id(),
                bytes = self.sent,
                "delivery completed"
            );
        } else {
            tracing::warn!(
                request_id = %prepared.request_id(),
                sent = self.sent,
                expected = self.expected,
                "delivery aborted"
            );
        }
        prepared.finish(delivered);
    }
}

impl Stream for DeliveryStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!("read error while delivering: {e}");
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for DeliveryStream {
    fn drop(&mut self) {
        self.finish();
    }
}
