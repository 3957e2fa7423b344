use anyhow::Context;
use nobg_service::{removal, routes, telemetry, AppState, ArtifactStorage, Config};
use std::sync::Arc;
use tokio::time::{interval, Duration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing()?;

    let mut config = Config::from_env()?;
    removal::prepare_local_model(&mut config.local_model).await;
    let storage = Arc::new(ArtifactStorage::new(&config.upload_dir, config.retention).await?);
    let remover = removal::from_config(&config).context("Failed to build background remover")?;

    if let Some(period) = config.sweep_interval {
        tokio::spawn(sweep_service(storage.clone(), period));
    }

    let bind_addr = config.bind_addr;
    let upload_dir = config.upload_dir.clone();
    let app = routes::router(AppState::new(config, storage, remover));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    tracing::info!(addr = %bind_addr, upload_dir = %upload_dir.display(), "Background removal service running");
    tracing::info!("Endpoints: GET /, POST /remove-bg, GET /download/:filename, GET /health, GET /about");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn sweep_service(storage: Arc<ArtifactStorage>, period: Duration) {
    let mut ticker = interval(period);

    loop {
        ticker.tick().await;
        let report = storage.sweep().await;
        tracing::debug!(
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "Scheduled cleanup finished"
        );
    }
}
