//! capplane HTTP server binary.
//!
//! Serves the control-plane API over axum.
//!
//! # Environment Variables
//!
//! - `CAPPLANE_CONFIG`: Configuration file (default: `capplane.yaml`)
//! - `PORT`: HTTP port, overrides `server.port` (default: 8080)
//! - `RUST_LOG`: Tracing filter (default: "info,capplane=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin capplane-server
//! ```

use anyhow::Context;
use capplane::server::{app_router, AppState};
use capplane::{ControlPlane, PlaneConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,capplane=debug".into()),
        )
        .init();

    let config = PlaneConfig::from_env().context("Failed to load configuration")?;
    let bind_addr = config.server.bind_addr();

    let plane = ControlPlane::from_config(&config).context("Failed to build control plane")?;
    tracing::info!(
        environments = config.environments.len(),
        cache_dir = %config.cache_dir.display(),
        "Control plane ready"
    );

    let app = app_router(AppState::new(plane));

    tracing::info!("capplane server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health         : liveness probe");
    tracing::info!("  GET  /traits         : list traits (?workload=)");
    tracing::info!("  GET  /workloads      : list workload types");
    tracing::info!("  POST /workloads      : stage or apply a workload");
    tracing::info!("  GET  /envs           : list environments");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
