//! tether: WebSocket server in front of the session multiplexer.
//!
//! Each connection opens with a hello. An attach hello binds the
//! connection to a session (spawning it if needed); output is streamed as
//! binary frames and control envelopes as JSON text. Sessions outlive their
//! connections until they are killed.

mod cli;
mod connection;
mod protocol;
mod viewer;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tether_common::TetherError;
use tether_config::TetherConfig;
use tether_mux::{LogNotifier, MemoryStore, MuxContext, SessionRegistry};
use tether_pty::PtySpawner;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tracing_subscriber::EnvFilter;

use crate::connection::handle_connection;

/// A bare level applies to tether's own crates; anything else is taken as
/// a full filter directive.
fn directive_for(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("tether={level}")
    }
}

fn init_logging(level: &str) {
    // RUST_LOG wins over flags and config.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive_for(level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    let config_path = args.config.as_deref().map(Path::new);
    let loaded = tether_config::load_config(config_path);
    let level = match &loaded {
        Ok(config) => config.logging.level.as_directive(),
        Err(_) => "info",
    };
    let directive = args
        .log_level
        .clone()
        .unwrap_or_else(|| level.to_string());
    init_logging(&directive);

    tracing::info!("tether v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        TetherConfig::default()
    });

    if args.print_config {
        println!("{}", tether_config::config_to_json(&config));
        return ExitCode::SUCCESS;
    }

    match run(args, config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: cli::Args, config: TetherConfig) -> tether_common::Result<()> {
    let ctx = MuxContext::from_config(
        &config,
        Arc::new(PtySpawner::new()),
        Arc::new(MemoryStore::new()),
        Arc::new(LogNotifier),
    )
    .map_err(|e| TetherError::Session(e.to_string()))?;
    let registry = Arc::new(SessionRegistry::new(ctx));

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("tether listening on {}", addr);

    let hello_timeout = Duration::from_secs(u64::from(config.server.hello_timeout_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let registry = Arc::clone(&registry);
                    tokio::spawn(async move {
                        match accept_async(stream).await {
                            Ok(ws) => handle_connection(ws, peer, registry, hello_timeout).await,
                            Err(e) => {
                                tracing::warn!(peer = %peer, error = %e, "WS handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            },
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    registry.shutdown().await;
    Ok(())
}
