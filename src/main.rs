mod config;
mod llm;
mod maintenance;
mod ocr;
mod pipeline;
mod storage;
mod translate;
mod web;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{config::AppConfig, web::AppState};

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err:#}");
            std::process::exit(1);
        }
    };
    init_tracing(config.debug);

    if let Err(err) = app_main(config).await {
        error!(?err, "application error");
        std::process::exit(1);
    }
}

async fn app_main(config: AppConfig) -> Result<()> {
    let addr = SocketAddr::new(config.host, config.port);
    let state = AppState::new(config).await?;
    maintenance::spawn(state.clone());

    let app = web::router::build_router(state);

    info!(%addr, "listening");
    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
