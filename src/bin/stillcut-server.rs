//! `stillcut-server` — HTTP front end for the frame-extraction pipeline.

use std::{net::SocketAddr, path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use stillcut::{
    AppState, ObjectStore, RemoteStoreConfig, StillcutError, router,
    store::DEFAULT_REQUEST_TIMEOUT,
};

#[derive(Debug, Parser)]
#[command(
    name = "stillcut-server",
    version,
    about = "Serve the stillcut frame-extraction and labeling API"
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Directory for uploaded videos and images awaiting processing.
    #[arg(long, default_value = "temp")]
    scratch_dir: PathBuf,

    /// Directory for extracted frames and saved label CSVs.
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Remote blob store endpoint, e.g. https://example.storage.dev/storage/v1.
    /// When unset, frames stay on the local filesystem.
    #[arg(long, env = "STILLCUT_STORE_ENDPOINT")]
    store_endpoint: Option<String>,

    /// Bucket receiving extracted frames.
    #[arg(long, env = "STILLCUT_STORE_BUCKET", default_value = "frames")]
    store_bucket: String,

    /// API key for the remote store.
    #[arg(long, env = "STILLCUT_STORE_API_KEY", default_value = "")]
    store_api_key: String,

    /// Per-request timeout against the remote store, in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    store_timeout_secs: u64,

    /// How long completed/failed tasks stay pollable, in seconds.
    #[arg(long, default_value_t = 3600)]
    task_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match serve(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("server failed: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(cli: Cli) -> Result<(), StillcutError> {
    let store = match cli.store_endpoint {
        Some(endpoint) => {
            tracing::info!(
                "Remote store enabled: {endpoint} (bucket {})",
                cli.store_bucket
            );
            ObjectStore::remote(RemoteStoreConfig {
                endpoint,
                bucket: cli.store_bucket,
                api_key: cli.store_api_key,
                timeout: Duration::from_secs(cli.store_timeout_secs),
            })?
        }
        None => {
            tracing::info!("Remote store disabled; frames stay on the local filesystem");
            ObjectStore::disabled()?
        }
    };

    let state = AppState::new(store, cli.scratch_dir, cli.output_dir)?;
    let app = router(state, Duration::from_secs(cli.task_ttl_secs));

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    tracing::info!("Listening on {}", cli.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    // In-flight task state is lost on restart; nothing to flush beyond
    // letting the listener drain.
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown requested");
}
