//! tunnel-proxy binary.
//!
//! Loads an optional TOML configuration, applies command-line overrides,
//! and runs the proxy until SIGINT or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use tunnel_proxy::config::loader::read_config;
use tunnel_proxy::config::ProxyConfig;
use tunnel_proxy::lifecycle::{wait_for_signal, Shutdown};
use tunnel_proxy::observability::{logging, metrics};
use tunnel_proxy::{FrameworkKind, HttpServer};

#[derive(Debug, Parser)]
#[command(name = "tunnel-proxy")]
#[command(about = "Reverse proxy for an application mounted under a front door path prefix", long_about = None)]
struct Cli {
    /// TOML configuration file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port the proxy listens on.
    #[arg(long)]
    port: Option<u16>,

    /// Address the proxy binds to.
    #[arg(long)]
    host: Option<String>,

    /// Port of the mounted application.
    #[arg(long)]
    service_port: Option<u16>,

    /// Host of the mounted application.
    #[arg(long)]
    service_host: Option<String>,

    /// External base path assigned by the front door.
    #[arg(long)]
    url_base_path: Option<String>,

    /// Mounted application kind.
    #[arg(long, value_enum)]
    framework: Option<FrameworkKind>,

    /// Require a validated token before relaying.
    #[arg(long)]
    token_auth: bool,

    /// Workspace URL tokens are validated against.
    #[arg(long)]
    token_auth_workspace_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(host) = self.host {
            config.listener.host = host;
        }
        if let Some(port) = self.service_port {
            config.upstream.port = port;
        }
        if let Some(host) = self.service_host {
            config.upstream.host = host;
        }
        if let Some(base) = self.url_base_path {
            config.mount.url_base_path = base;
        }
        if let Some(framework) = self.framework {
            config.mount.framework = framework;
        }
        if self.token_auth {
            config.gate.enabled = true;
        }
        if let Some(url) = self.token_auth_workspace_url {
            config.gate.workspace_url = Some(url);
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(address) = self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = address;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    logging::init_tracing(&config.observability.log_level);

    tracing::info!("tunnel-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let server = HttpServer::from_config(&config)?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(error) = metrics::init_metrics(addr) {
                    tracing::error!(error = %error, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address();
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(address = %bind_address, error = %error, "Failed to bind listener");
            return Err(error.into());
        }
    };

    let shutdown = Shutdown::new();
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => {
            result??;
        }
        () = wait_for_signal() => {
            shutdown.trigger();
            server_task.await??;
        }
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
