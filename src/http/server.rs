//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with the dispatcher as the only handler
//! - Wire up middleware (request ID, tracing)
//! - Classify each request once into a `RequestContext`
//! - Dispatch WebSocket upgrades to the WebSocket relay and everything else
//!   through the gate (when enabled) to the HTTP relay
//! - Serve until the shutdown broadcast fires; then refuse new body reads
//!   and end WebSocket sessions

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    extract::ws::WebSocketUpgrade,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::{ConfigError, ProxyConfig};
use crate::gate::{AccessGate, GateOutcome};
use crate::http::context::RequestContext;
use crate::http::relay::{self, UpstreamClient};
use crate::http::websocket;
use crate::lifecycle::Shutdown;
use crate::proxy::ProxyConfiguration;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfiguration>,
    pub client: UpstreamClient,
    /// Permits for concurrent inbound body reads.
    pub body_reads: Arc<Semaphore>,
    pub gate: Option<AccessGate>,
    /// Fires when WebSocket sessions must end.
    pub sessions: Shutdown,
    pub self_port: u16,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    config: Arc<ProxyConfiguration>,
    client: UpstreamClient,
    body_reads: Arc<Semaphore>,
    gate: Option<AccessGate>,
}

impl HttpServer {
    pub fn new(config: ProxyConfiguration) -> Result<Self, ConfigError> {
        let client = relay::build_client(config.relay());
        let body_reads = Arc::new(Semaphore::new(config.relay().max_concurrent_body_reads));
        let gate = config.gate().map(AccessGate::new).transpose()?;

        Ok(Self {
            config: Arc::new(config),
            client,
            body_reads,
            gate,
        })
    }

    /// Validate and compile a file configuration, then build the server.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        Self::new(ProxyConfiguration::from_config(config)?)
    }

    pub fn config(&self) -> &ProxyConfiguration {
        &self.config
    }

    fn build_router(&self, self_port: u16, sessions: Shutdown) -> Router {
        let state = AppState {
            config: self.config.clone(),
            client: self.client.clone(),
            body_reads: self.body_reads.clone(),
            gate: self.gate.clone(),
            sessions,
            self_port,
        };

        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let sessions = Shutdown::new();
        let router = self.build_router(addr.port(), sessions.clone());
        let body_reads = self.body_reads.clone();

        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream(),
            framework = %self.config.framework(),
            base_path = %self.config.base_path(),
            rules = self.config.rules().len(),
            gate = self.gate.is_some(),
            "HTTP server starting"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
                body_reads.close();
                sessions.trigger();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Request dispatcher: classify, then hand to the WebSocket relay or, past
/// the gate, to the HTTP relay.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (mut parts, body) = request.into_parts();
    let mut ctx = RequestContext::new(&parts, &state.config, state.self_port);

    if websocket::is_websocket_upgrade(&parts.headers) {
        return match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(ws) => websocket::relay_websocket(&state, ctx, ws).await,
            Err(rejection) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    error = %rejection,
                    "Malformed WebSocket upgrade"
                );
                rejection.into_response()
            }
        };
    }

    let body = match &state.gate {
        Some(gate) => match gate.admit(&state.config, &mut ctx, body).await {
            GateOutcome::Authenticated(body) => body,
            GateOutcome::PresentingLogin(response) => return response,
        },
        None => body,
    };

    relay::relay_http(&state, ctx, body).await
}
