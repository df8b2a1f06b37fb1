//! Zpark API Server
//!
//! Bridges Zabbix monitoring into Cisco Spark rooms and answers bot
//! commands sent back through Spark webhooks.
//!
//! Usage:
//!   cargo run --bin zpark
//!
//! Environment:
//!   ZPARK_PORT  - Server port (default: 8080; hosted platforms use PORT)
//!   ZPARK_HOST  - Server host (default: 0.0.0.0)
//!   RUST_LOG    - Log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use zpark::api::{create_router, AppState};
use zpark::config::Config;
use zpark::providers::{SparkClient, ZabbixClient};
use zpark::tasks::{self, TaskContext, TaskQueue};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    let config = Arc::new(Config::from_env()?);

    let spark = Arc::new(SparkClient::new(
        config.spark_api_url.clone(),
        &config.spark_access_token,
    )?);
    let zabbix = Arc::new(ZabbixClient::new(
        &config.zabbix_url,
        config.zabbix_username.clone(),
        config.zabbix_password.clone(),
        config.zabbix_tls_verify,
    )?);

    // Task queue and runner
    let (queue, rx) = TaskQueue::new();
    let ctx = Arc::new(TaskContext {
        config: config.clone(),
        spark,
        zabbix,
        queue: queue.clone(),
    });
    let runner = tasks::spawn_runner(ctx, rx);
    info!(
        concurrency = config.worker_concurrency,
        "Task runner started"
    );

    let state = Arc::new(AppState::new(config.clone(), queue));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Zpark API starting on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /api/v1/ping     - Liveness check (token auth)");
    info!("  POST /api/v1/alert    - Relay a Zabbix alert to Spark (token auth)");
    info!("  POST /api/v1/webhook  - Spark webhook callback (HMAC auth)");
    info!("Press Ctrl+C for graceful shutdown");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    info!("Shutdown signal received, stopping task runner");
    runner.abort();
    info!("Zpark shutdown complete");

    Ok(())
}
