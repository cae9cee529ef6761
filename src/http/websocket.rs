//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Open the upstream WebSocket before accepting the client's upgrade
//! - Adapt handshake headers for frameworks that validate them
//! - Bidirectional frame forwarding until either side goes away
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - The upstream handshake happens first so its subprotocol can be echoed
//!   to the client, and a refused handshake becomes a 502 instead of an
//!   accepted socket that closes immediately
//! - Text and binary frames are forwarded; ping/pong are answered by each
//!   transport and never forwarded; raw frames end the session
//! - Whichever direction finishes first ends both; close errors are ignored

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::{ProtocolError, SubProtocolError};
use tokio_tungstenite::tungstenite::handshake::client::{
    Request as ClientRequest, Response as HandshakeResponse,
};
use tokio_tungstenite::tungstenite::{self, Message as UpstreamMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::http::context::RequestContext;
use crate::http::response;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::ProxyConfiguration;

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum WebSocketRelayError {
    #[error("invalid upstream WebSocket request: {0}")]
    Request(#[source] tungstenite::Error),

    #[error("upstream WebSocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),

    #[error("client WebSocket error: {0}")]
    Client(#[source] axum::Error),

    #[error("upstream WebSocket error: {0}")]
    Upstream(#[source] tungstenite::Error),

    #[error("unsupported {0} frame")]
    UnsupportedFrame(&'static str),
}

/// Headers regenerated by the client handshake, never copied from the caller.
const HANDSHAKE_HEADERS: [HeaderName; 8] = [
    header::HOST,
    header::CONNECTION,
    header::UPGRADE,
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_VERSION,
    header::SEC_WEBSOCKET_EXTENSIONS,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
];

/// Whether the request asks for a WebSocket upgrade.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let upgrade = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    let connection = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    upgrade && connection
}

/// Header policy for upstreams that check `Origin` on upgrade: point
/// `Origin` at this proxy's local port, pin `Accept-Encoding`, and drop
/// `x-*` and `cf-*` headers.
pub fn adapt_handshake_headers(headers: &mut HeaderMap, self_port: u16) {
    let dropped: Vec<HeaderName> = headers
        .keys()
        .filter(|name| {
            let name = name.as_str();
            name.starts_with("x-") || name.starts_with("cf-")
        })
        .cloned()
        .collect();
    for name in dropped {
        headers.remove(name);
    }

    if headers.contains_key(header::ORIGIN) {
        if let Ok(origin) = HeaderValue::from_str(&format!("http://0.0.0.0:{self_port}")) {
            headers.insert(header::ORIGIN, origin);
        }
    }
    if headers.contains_key(header::ACCEPT_ENCODING) {
        headers.insert(
            header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );
    }
}

/// Handshake request for the upstream, query string preserved.
pub fn upstream_request(
    config: &ProxyConfiguration,
    ctx: &RequestContext,
) -> Result<ClientRequest, WebSocketRelayError> {
    let url = format!("ws://{}{}", config.upstream(), ctx.upstream_path_and_query());
    let mut request = url
        .into_client_request()
        .map_err(WebSocketRelayError::Request)?;

    let mut forwarded = ctx.headers.clone();
    for name in &HANDSHAKE_HEADERS {
        forwarded.remove(name);
    }
    if config.framework().adapts_websocket_headers() {
        adapt_handshake_headers(&mut forwarded, ctx.self_port);
    }

    let headers = request.headers_mut();
    let mut last = None;
    for (name, value) in forwarded {
        if let Some(name) = name {
            last = Some(name);
        }
        if let Some(name) = &last {
            headers.append(name.clone(), value);
        }
    }

    match config.host_header() {
        Some(host) => {
            headers.insert(header::HOST, host.clone());
        }
        None => {
            if let Some(host) = ctx.headers.get(header::HOST) {
                headers.insert(header::HOST, host.clone());
            }
        }
    }
    Ok(request)
}

/// Complete the upstream handshake. An upstream that accepts the upgrade
/// without choosing any of the offered subprotocols gets a second handshake
/// with no offer, and the session proceeds without a subprotocol.
async fn open_upstream(
    request: ClientRequest,
    config: &ProxyConfiguration,
    ctx: &RequestContext,
) -> Result<(UpstreamSocket, HandshakeResponse), WebSocketRelayError> {
    let offered = request.headers().contains_key(header::SEC_WEBSOCKET_PROTOCOL);
    match tokio_tungstenite::connect_async(request).await {
        Ok(connected) => Ok(connected),
        Err(tungstenite::Error::Protocol(ProtocolError::SecWebSocketSubProtocolError(
            SubProtocolError::NoSubProtocol,
        ))) if offered => {
            tracing::debug!(
                request_id = %ctx.request_id,
                "Upstream chose no subprotocol; reconnecting without an offer"
            );
            let mut request = upstream_request(config, ctx)?;
            request.headers_mut().remove(header::SEC_WEBSOCKET_PROTOCOL);
            tokio_tungstenite::connect_async(request)
                .await
                .map_err(WebSocketRelayError::Handshake)
        }
        Err(error) => Err(WebSocketRelayError::Handshake(error)),
    }
}

/// Upgrade the client once the upstream has accepted the handshake.
pub async fn relay_websocket(state: &AppState, ctx: RequestContext, ws: WebSocketUpgrade) -> Response {
    let request = match upstream_request(&state.config, &ctx) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!(request_id = %ctx.request_id, error = %error, "Rejected WebSocket upgrade");
            return response::bad_request("Invalid WebSocket request");
        }
    };

    let (upstream, handshake) = match open_upstream(request, &state.config, &ctx).await {
        Ok(connected) => connected,
        Err(error) => {
            tracing::error!(
                request_id = %ctx.request_id,
                upstream_path = %ctx.upstream_path,
                error = %error,
                "Failed to open upstream WebSocket"
            );
            return response::upstream_failed();
        }
    };

    let protocol = handshake
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let ws = match protocol {
        Some(protocol) => ws.protocols([protocol]),
        None => ws,
    };

    let session = WebSocketSession {
        id: Uuid::new_v4(),
        upstream,
        shutdown: state.sessions.subscribe(),
    };
    tracing::info!(
        request_id = %ctx.request_id,
        session_id = %session.id,
        upstream_path = %ctx.upstream_path,
        "WebSocket session opened"
    );

    ws.on_upgrade(move |client| session.run(client))
}

/// One relayed WebSocket connection.
pub struct WebSocketSession {
    id: Uuid,
    upstream: UpstreamSocket,
    shutdown: broadcast::Receiver<()>,
}

impl WebSocketSession {
    pub async fn run(mut self, client: WebSocket) {
        metrics::record_websocket_opened();

        let (mut client_tx, mut client_rx) = client.split();
        let (mut upstream_tx, mut upstream_rx) = self.upstream.split();

        let outcome = tokio::select! {
            result = client_to_upstream(&mut client_rx, &mut upstream_tx) => result,
            result = upstream_to_client(&mut upstream_rx, &mut client_tx) => result,
            _ = self.shutdown.recv() => Ok("proxy shutting down"),
        };

        match outcome {
            Ok(reason) => tracing::info!(session_id = %self.id, reason, "WebSocket session closed"),
            Err(error) => tracing::warn!(session_id = %self.id, error = %error, "WebSocket session ended"),
        }

        let _ = upstream_tx.close().await;
        let _ = client_tx.close().await;
        metrics::record_websocket_closed();
    }
}

async fn client_to_upstream(
    client: &mut SplitStream<WebSocket>,
    upstream: &mut SplitSink<UpstreamSocket, UpstreamMessage>,
) -> Result<&'static str, WebSocketRelayError> {
    while let Some(message) = client.next().await {
        let forwarded = match message.map_err(WebSocketRelayError::Client)? {
            Message::Text(text) => UpstreamMessage::Text(text.as_str().to_owned().into()),
            Message::Binary(data) => UpstreamMessage::Binary(data),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return Ok("client closed"),
        };
        upstream
            .send(forwarded)
            .await
            .map_err(WebSocketRelayError::Upstream)?;
    }
    Ok("client disconnected")
}

async fn upstream_to_client(
    upstream: &mut SplitStream<UpstreamSocket>,
    client: &mut SplitSink<WebSocket, Message>,
) -> Result<&'static str, WebSocketRelayError> {
    while let Some(message) = upstream.next().await {
        let forwarded = match message.map_err(WebSocketRelayError::Upstream)? {
            UpstreamMessage::Text(text) => Message::Text(text.as_str().to_owned().into()),
            UpstreamMessage::Binary(data) => Message::Binary(data),
            UpstreamMessage::Ping(_) | UpstreamMessage::Pong(_) => continue,
            UpstreamMessage::Close(_) => return Ok("upstream closed"),
            UpstreamMessage::Frame(_) => return Err(WebSocketRelayError::UnsupportedFrame("raw")),
        };
        client
            .send(forwarded)
            .await
            .map_err(WebSocketRelayError::Client)?;
    }
    Ok("upstream disconnected")
}
