//! HTTP relay.
//!
//! # Data Flow
//! ```text
//! RequestContext + body
//!     → streaming decision (inbound)       small bodies buffered, large streamed
//!     → upstream request                   Host overridden, query preserved
//!     → RetryOnceConnector                 one retry on connect failure
//!     → streaming decision (outbound)      large 200s streamed untouched
//!     → rewrite (front door, buffered)     Content-Length recomputed
//! ```
//!
//! # Design Decisions
//! - A bounded semaphore caps concurrent inbound body reads
//! - Connect failures after the retry become a 502 with guidance text; the
//!   proxy fabricates no other bodies

use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode, Uri};
use axum::response::Response;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::http::context::RequestContext;
use crate::http::request::{strip_hop_by_hop, upstream_headers};
use crate::http::response;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::RelaySettings;
use crate::resilience::RetryOnceConnector;

pub type UpstreamClient = Client<RetryOnceConnector<HttpConnector>, Body>;

pub fn build_client(settings: &RelaySettings) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(settings.connect_timeout));
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(RetryOnceConnector::new(
        connector,
        settings.connect_retry_backoff,
    ))
}

/// Declared body length; `None` when absent or malformed.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Stream the inbound body unless it is declared and below the threshold.
pub fn should_stream_request(method: &Method, declared: Option<u64>, threshold: u64) -> bool {
    if *method == Method::GET || *method == Method::HEAD {
        return false;
    }
    match declared {
        Some(len) => len >= threshold,
        None => true,
    }
}

/// Stream a 200 response that is larger than the threshold or of unknown
/// length; everything else is buffered and eligible for rewriting.
pub fn should_stream_response(status: StatusCode, declared: Option<u64>, threshold: u64) -> bool {
    if status != StatusCode::OK {
        return false;
    }
    match declared {
        Some(len) => len > threshold,
        None => true,
    }
}

pub async fn relay_http(state: &AppState, ctx: RequestContext, body: Body) -> Response {
    let started = Instant::now();
    let response = forward(state, &ctx, body).await;
    let status = response.status();

    metrics::record_request(ctx.method.as_str(), status.as_u16(), started);
    tracing::debug!(
        request_id = %ctx.request_id,
        method = %ctx.method,
        path = %ctx.path,
        upstream_path = %ctx.upstream_path,
        status = status.as_u16(),
        "Relayed request"
    );
    response
}

async fn forward(state: &AppState, ctx: &RequestContext, body: Body) -> Response {
    let config = &state.config;
    let settings = config.relay();
    let mut headers = upstream_headers(&ctx.headers, config.host_header());

    let rewrite_candidate = ctx.via_front_door && config.rules().find(&ctx.upstream_path).is_some();
    if rewrite_candidate {
        headers.remove(header::ACCEPT_ENCODING);
    }

    let uri = match Uri::try_from(format!(
        "http://{}{}",
        config.upstream(),
        ctx.upstream_path_and_query()
    )) {
        Ok(uri) => uri,
        Err(_) => return response::bad_request("Invalid request path"),
    };

    let upstream_result = {
        let _permit = match state.body_reads.acquire().await {
            Ok(permit) => permit,
            Err(_) => return response::service_unavailable(),
        };

        let body = if ctx.method == Method::GET || ctx.method == Method::HEAD {
            headers.remove(header::CONTENT_LENGTH);
            Body::empty()
        } else if should_stream_request(
            &ctx.method,
            content_length(&ctx.headers),
            settings.incoming_streaming_threshold,
        ) {
            body
        } else {
            let limit = usize::try_from(settings.incoming_streaming_threshold).unwrap_or(usize::MAX);
            match axum::body::to_bytes(body, limit).await {
                Ok(bytes) => Body::from(bytes),
                Err(error) => {
                    tracing::warn!(request_id = %ctx.request_id, error = %error, "Failed to read request body");
                    return response::bad_request("Unable to read request body");
                }
            }
        };

        let mut request = Request::new(body);
        *request.method_mut() = ctx.method.clone();
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;

        state.client.request(request).await
    };

    let upstream = match upstream_result {
        Ok(upstream) => upstream,
        Err(error) if error.is_connect() => {
            tracing::error!(
                request_id = %ctx.request_id,
                upstream = %config.upstream(),
                error = %error,
                "Failed to connect to upstream after retry"
            );
            return response::upstream_unavailable();
        }
        Err(error) => {
            tracing::error!(request_id = %ctx.request_id, error = %error, "Upstream error");
            return response::upstream_failed();
        }
    };

    let (mut parts, incoming) = upstream.into_parts();
    strip_hop_by_hop(&mut parts.headers);

    if should_stream_response(
        parts.status,
        content_length(&parts.headers),
        settings.outgoing_streaming_threshold,
    ) {
        return Response::from_parts(parts, Body::new(incoming));
    }

    let bytes = match axum::body::to_bytes(Body::new(incoming), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(request_id = %ctx.request_id, error = %error, "Failed to read upstream body");
            return response::upstream_failed();
        }
    };

    if ctx.via_front_door && !bytes.is_empty() {
        if let Some((rule, rewritten)) = config.rules().rewrite(&ctx.upstream_path, &bytes) {
            tracing::debug!(
                request_id = %ctx.request_id,
                rule = %rule,
                before = bytes.len(),
                after = rewritten.len(),
                "Rewrote response body"
            );
            metrics::record_rewrite(rule);
            response::set_rewritten_length(&mut parts.headers, rewritten.len());
            return Response::from_parts(parts, Body::from(rewritten));
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}
