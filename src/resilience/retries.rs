//! Retry logic.
//!
//! # Responsibilities
//! - Retry a failed upstream connect exactly once after a fixed backoff
//! - Leave every other failure to the caller
//!
//! # Design Decisions
//! - Retrying at the connector means the request body is never consumed
//!   before a connection exists, so streamed uploads survive the retry
//! - Only connection establishment is retried; a request that reached the
//!   upstream is never replayed

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::Uri;
use tower::{Service, ServiceExt};

use crate::observability::metrics;

/// Connector wrapper that retries a failed connect once.
#[derive(Debug, Clone)]
pub struct RetryOnceConnector<C> {
    inner: C,
    backoff: Duration,
}

impl<C> RetryOnceConnector<C> {
    pub fn new(inner: C, backoff: Duration) -> Self {
        Self { inner, backoff }
    }
}

impl<C> Service<Uri> for RetryOnceConnector<C>
where
    C: Service<Uri> + Clone + Send + 'static,
    C::Response: Send,
    C::Error: std::fmt::Display + Send,
    C::Future: Send,
{
    type Response = C::Response;
    type Error = C::Error;
    type Future = Pin<Box<dyn Future<Output = Result<C::Response, C::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let first = self.inner.call(uri.clone());
        let retry = self.inner.clone();
        let backoff = self.backoff;

        Box::pin(async move {
            match first.await {
                Ok(connection) => Ok(connection),
                Err(error) => {
                    tracing::warn!(
                        upstream = %uri,
                        error = %error,
                        delay = ?backoff,
                        "Failed to connect to upstream; retrying once"
                    );
                    metrics::record_connect_retry();
                    tokio::time::sleep(backoff).await;
                    retry.oneshot(uri).await
                }
            }
        })
    }
}
