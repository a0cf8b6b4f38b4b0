//! Stub ATProto services for exercising the bridge without the network.
//!
//! Each service is a plain [`Router`] builder so tests can [`spawn`] it on an
//! ephemeral port; the binaries wrap the same routers with [`run_server`].

use std::env;
use std::net::SocketAddr;

use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub mod handle_host;
pub mod jwt;
pub mod pds;
pub mod plc_directory;

/// Flags shared by every fixture binary
#[derive(Parser, Debug, Clone)]
pub struct FixtureArgs {
    /// Port to listen on; 0 picks a free one
    #[arg(short, long, default_value = "0")]
    pub port: u16,

    /// Address to bind
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Start even when required environment variables are missing
    #[arg(long)]
    pub force: bool,
}

impl FixtureArgs {
    fn addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Reads `name`, or with `force` falls back to `placeholder`.
pub fn require_env_var(name: &str, force: bool, placeholder: &str) -> anyhow::Result<String> {
    match env::var(name) {
        Ok(value) => Ok(value),
        Err(_) if force => {
            warn!("{} not set, using {} because of --force", name, placeholder);
            Ok(placeholder.to_string())
        }
        Err(_) => anyhow::bail!("{name} must be set (or pass --force)"),
    }
}

/// Environment variable with a fixture default.
pub fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Runs one fixture in the foreground until it fails.
pub async fn run_server(args: FixtureArgs, app: Router) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let listener = TcpListener::bind(args.addr()?).await?;
    info!("Fixture server listening on {}", listener.local_addr()?);

    axum::serve(listener, app.layer(TraceLayer::new_for_http())).await?;
    Ok(())
}

/// Serves `app` on an ephemeral localhost port in the background.
///
/// The server lives as long as the current tokio runtime.
pub async fn spawn(app: Router) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Fixture server on {} stopped: {}", addr, e);
        }
    });

    Ok(addr)
}
