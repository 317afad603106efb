mod api;
mod cli;
mod live;
mod router;
mod startup;
mod state;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use repoflow_core::Config;
use repoflow_storage::{LocalStatusStore, StatusStore};
use repoflow_worker::{shutdown_signal, WorkerRunner, WorkerRunnerConfig};

use crate::cli::{Cli, Command};

fn load_config() -> Config {
    repoflow_core::config::load_dotenv();
    Config::from_env()
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.log_summary();

    let state = startup::build_state(&config).await?;

    let shutdown = Arc::new(Notify::new());
    let runner = tokio::spawn(WorkerRunner::run(
        state.dispatcher.clone(),
        WorkerRunnerConfig::from_config(&config),
        shutdown.clone(),
    ));

    tokio::spawn(startup::track_revisions(
        state.repositories.clone(),
        state.progress.subscribe(),
    ));

    let app = router::build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, waiting for workers");
    shutdown.notify_one();
    runner.await??;
    info!("repoflow exited cleanly");
    Ok(())
}

async fn status(config: &Config, uri: &str) -> anyhow::Result<()> {
    let store = LocalStatusStore::open(config.storage.status_path()).await?;
    match store.get_status(uri).await? {
        Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
        None => println!("no status recorded for {uri}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config();

    match cli.command {
        Command::Serve { host, port } => serve(config, host, port).await?,
        Command::Status { uri } => status(&config, &uri).await?,
    }

    Ok(())
}
