mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use brandpulse_monitor::{ArtifactWriter, Pipeline, SnapshotStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = brandpulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let entities = brandpulse_core::load_entities(&config.entities_path)?.entities;
    tracing::info!(
        entities = entities.len(),
        path = %config.entities_path.display(),
        "loaded tracked entities"
    );

    let pipeline = Pipeline::from_config(&config, &entities)?;
    let artifacts = config.artifacts_dir.clone().map(ArtifactWriter::new);
    let store = Arc::new(SnapshotStore::new(pipeline, artifacts));
    let shutdown = CancellationToken::new();

    let _scheduler = match config.refresh_cron.as_deref() {
        Some(cron) => Some(
            scheduler::build_scheduler(cron, Arc::clone(&store), shutdown.clone()).await?,
        ),
        None => None,
    };

    let app = build_app(
        AppState {
            store,
            shutdown: shutdown.clone(),
        },
        &config.cors_origins,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
    shutdown.cancel();
}
