use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use labpass_backend::{config::Settings, create_router, storage::FlatFileStorage, AppState};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Event check-in server
#[derive(Parser, Debug)]
#[command(name = "labpass", version, about)]
struct Args {
    /// Top-level config file, layered over config/default.toml
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Data directory, overriding `storage.path`
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = match Settings::load_from(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing("info", false);
            error!(error = %e, config = %args.config.display(), "refusing to start");
            return Err(e.into());
        }
    };
    init_tracing(&settings.log_level, settings.json_logs);

    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.storage.path));
    let storage = FlatFileStorage::new(&data_dir)
        .with_context(|| format!("opening data directory {}", data_dir.display()))?;

    let addr = settings.bind_addr()?;
    let state = AppState::new(Arc::new(storage), settings).await?;
    let _background = state.start_background();

    let app = create_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, data_dir = %data_dir.display(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
}
