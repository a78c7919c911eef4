//! Assistant orchestrator
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!   AiRequest          │  FallbackOrchestrator                                │
//!   ───────────────────┼─▶ chain: primary → local_bridge → cloud_function    │
//!                      │           → specialist → offline                    │
//!                      │      │                                               │
//!                      │      ▼                                               │
//!                      │  BackendAdapter ── CircuitBreaker ── HealthState     │
//!                      │      ▲                                   │           │
//!                      │      │ probe()                            ▼          │
//!                      │  HealthMonitor (per adapter)       StatusPublisher   │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use assistant_orchestrator::config::{load_config, watcher::ConfigWatcher, OrchestratorConfig};
use assistant_orchestrator::http::AdminServer;
use assistant_orchestrator::lifecycle::{AssistantRuntime, StartupError};
use assistant_orchestrator::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "assistant-orchestrator")]
#[command(about = "Multi-backend AI request orchestrator", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => OrchestratorConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "assistant-orchestrator starting");

    tracing::info!(
        chain = ?config.fallback.chain,
        admin_enabled = config.admin.enabled,
        status_interval_ms = config.status.interval_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let runtime = Arc::new(AssistantRuntime::from_config(&config)?);
    runtime.start();

    let admin = if config.admin.enabled {
        let address = &config.admin.bind_address;
        let listener = TcpListener::bind(address.as_str())
            .await
            .map_err(|source| StartupError::Bind {
                address: address.clone(),
                source,
            })?;
        let server = AdminServer::new(runtime.clone(), &config.admin);
        let shutdown = runtime.shutdown_signal();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(listener, shutdown).await {
                tracing::error!(error = %e, "Admin server failed");
            }
        }))
    } else {
        None
    };

    // Keep the watcher alive for the life of the process.
    let _watcher = match &args.config {
        Some(path) => match ConfigWatcher::start(path) {
            Ok((watcher, updates)) => {
                runtime.follow_config_updates(updates);
                Some(watcher)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Config hot reload unavailable");
                None
            }
        },
        None => None,
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    runtime.shutdown().await;
    if let Some(handle) = admin {
        let _ = handle.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
