//! rg-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads the limits,
//! wires the paper engine and poll loop, and starts the HTTP server. All
//! route handlers live in `routes.rs`; shared state types live in `state.rs`.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use rg_daemon::{paper, routes, state};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::var("RISKGUARD_CONFIG").ok().map(PathBuf::from);
    let limits = rg_config::RiskLimits::load_or_default(config_path.as_deref())
        .context("loading risk limits")?;
    info!(
        per_trade = limits.per_trade_max_pct,
        aggregate = limits.aggregate_max_pct,
        drawdown = limits.drawdown_limit_pct,
        "risk limits loaded"
    );

    let shared = Arc::new(state::AppState::new());
    let poll_interval = Duration::from_millis(limits.poll_interval_ms);
    let engine = paper::build_engine(limits, Utc::now());
    tokio::spawn(poll_loop(Arc::clone(&shared), engine, poll_interval));

    let app = routes::build_router(Arc::clone(&shared)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8787)));
    info!("rg-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

/// Drive the engine at the configured cadence and publish its status after
/// every attempt. A failed cycle is logged and retried on the next tick.
async fn poll_loop(
    shared: Arc<state::AppState>,
    mut engine: paper::PaperEngine,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let now = Utc::now();
        match engine.run_cycle(now) {
            Ok(report) => {
                if !report.violations.is_empty() {
                    warn!(count = report.violations.len(), "violations this cycle");
                }
            }
            Err(err) => warn!(%err, "cycle skipped"),
        }
        *shared.status.write().await = Some(engine.status());
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("RISKGUARD_ADDR").ok()?.parse().ok()
}
