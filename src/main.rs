use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use codereview::{logging, server, AppState, ServiceConfig, VERSION};

#[derive(Debug, Parser)]
#[command(name = "codereview-server", version, about = "Repository function review service")]
struct Args {
    /// Path to a TOML config file (defaults to ./codereview.toml when present)
    #[arg(short, long, env = "CODEREVIEW_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overrides `bind_address`
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level or filter directive, overrides `log_level`
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = ServiceConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    config.log_json |= args.log_json;

    logging::init(&config.log_level, config.log_json)?;
    info!("Starting codereview-server {}", VERSION);
    info!(
        "LLM_PROVIDER set to: {}, repositories stored under {}",
        config.llm_provider,
        config.repo_storage_path.display()
    );

    tokio::fs::create_dir_all(&config.repo_storage_path)
        .await
        .with_context(|| format!("Failed to create storage directory {}", config.repo_storage_path.display()))?;

    let state = AppState::from_config(&config).context("Failed to initialize model backend")?;
    let app = server::router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("Listening on {}", config.bind_address);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
