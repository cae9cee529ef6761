//! Shared utilities for integration tests: mock upstreams and a proxy
//! harness.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{any, get};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse,
};
use tokio_tungstenite::tungstenite::Message;

use tunnel_proxy::{HttpServer, ProxyConfig, Shutdown};

pub const BASE_PATH: &str = "/driver-proxy/o/1/abc/8080/";

async fn bind_local() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let (listener, addr) = bind_local().await;
    drop(listener);
    addr.port()
}

/// Start a raw backend that answers every request with a fixed 200.
pub async fn start_fixed_backend(content_type: &'static str, body: Vec<u8>) -> SocketAddr {
    let (listener, addr) = bind_local().await;

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let body = body.clone();
                    tokio::spawn(async move {
                        let mut head = Vec::new();
                        let mut buf = [0u8; 1024];
                        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => head.extend_from_slice(&buf[..n]),
                            }
                        }
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                            content_type,
                            body.len()
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.write_all(&body).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start an axum backend that describes each request it receives:
/// `method path?query|host|authorization|accept-encoding|body-length`.
pub async fn start_echo_backend() -> SocketAddr {
    async fn describe(request: Request) -> (StatusCode, String) {
        let (parts, body) = request.into_parts();
        let value_of = |name: header::HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string()
        };
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default();
        (
            StatusCode::OK,
            format!(
                "{} {}|{}|{}|{}|{}",
                parts.method,
                target,
                value_of(header::HOST),
                value_of(header::AUTHORIZATION),
                value_of(header::ACCEPT_ENCODING),
                body.len()
            ),
        )
    }

    let (listener, addr) = bind_local().await;
    let app = Router::new()
        .route("/", any(describe))
        .route("/{*path}", any(describe));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a WebSocket backend that echoes text and binary frames. Each
/// handshake's request target is sent on the returned channel, and a
/// `closed` marker follows when the connection ends.
pub async fn start_ws_echo_backend() -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let (listener, addr) = bind_local().await;
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let events = events_tx.clone();
            tokio::spawn(async move {
                let handshake_events = events.clone();
                let callback = move |request: &HandshakeRequest,
                                     mut response: HandshakeResponse|
                      -> Result<HandshakeResponse, ErrorResponse> {
                    let _ = handshake_events.send(request.uri().to_string());
                    if let Some(protocol) = request
                        .headers()
                        .get(header::SEC_WEBSOCKET_PROTOCOL)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.split(',').next())
                    {
                        if let Ok(value) = protocol.trim().parse() {
                            response
                                .headers_mut()
                                .insert(header::SEC_WEBSOCKET_PROTOCOL, value);
                        }
                    }
                    Ok(response)
                };

                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    match message {
                        Message::Text(_) | Message::Binary(_) => {
                            if ws.send(message).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                let _ = events.send("closed".to_string());
            });
        }
    });

    (addr, events_rx)
}

/// Start a WebSocket backend that accepts, sends one frame, then closes.
pub async fn start_ws_closing_backend() -> SocketAddr {
    let (listener, addr) = bind_local().await;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
                    let _ = ws.send(Message::text("bye")).await;
                    let _ = ws.close(None).await;
                }
            });
        }
    });
    addr
}

/// Start a mock identity provider that knows one token.
pub async fn start_identity_provider(token: &'static str, user_name: &'static str) -> SocketAddr {
    let expected = format!("Bearer {token}");
    let app = Router::new().route(
        "/api/2.0/preview/scim/v2/Me",
        get(move |headers: HeaderMap| {
            let expected = expected.clone();
            async move {
                let presented = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok());
                if presented == Some(expected.as_str()) {
                    (
                        StatusCode::OK,
                        Body::from(format!(r#"{{"id":"1","userName":"{user_name}","active":true}}"#)),
                    )
                } else {
                    (StatusCode::UNAUTHORIZED, Body::from(r#"{"detail":"invalid token"}"#))
                }
            }
        }),
    );

    let (listener, addr) = bind_local().await;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Config pointing at `upstream`, mounted under [`BASE_PATH`].
pub fn proxy_config(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.host = upstream.ip().to_string();
    config.upstream.port = upstream.port();
    config.mount.url_base_path = BASE_PATH.to_string();
    config.relay.connect_retry_backoff_ms = 50;
    config
}

/// Run a proxy on an ephemeral port. Keep the returned `Shutdown` alive for
/// the duration of the test.
pub async fn spawn_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let server = HttpServer::from_config(&config).unwrap();
    let (listener, addr) = bind_local().await;
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });
    (addr, shutdown)
}

/// `http://<proxy>/<BASE_PATH>/<path>`
pub fn external_url(proxy: SocketAddr, path: &str) -> String {
    format!(
        "http://{}{}{}",
        proxy,
        BASE_PATH.trim_end_matches('/'),
        path
    )
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
