use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::client::billing_client::BillingClient;
use crate::config::settings::Settings;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::server::routes::BilletState;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub billet_state: BilletState,
}

impl AppState {
    pub fn new(metrics: &Metrics, client: Arc<BillingClient>) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            billet_state: BilletState::new(client),
        }
    }
}

pub fn app(settings: &Settings, state: AppState) -> Router {
    Router::new()
        .merge(state.metrics_state.router(&settings.metrics))
        .merge(state.billet_state.router())
        .with_state(state)
}

/// Serves the billet routes (and `/metrics` when enabled) until Ctrl-C.
pub async fn start(settings: &Settings, client: Arc<BillingClient>) -> Result<()> {
    let metrics = get_metrics().await;
    let app = app(settings, AppState::new(metrics, client));

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", bind_addr))?;
    info!("listening on {}", bind_addr);

    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    metrics.up.set(0);

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
