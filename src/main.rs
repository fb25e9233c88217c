use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use devhub::cache::{self, CacheGateway};
use devhub::github::{GithubClient, GithubSource};
use devhub::server::{self, AppState};
use devhub::util::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "devhub", version, about = "Developer productivity hub backend")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Enable debug logging (also to a file)
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // --debug without --log-dir writes to the platform data dir
    let log_dir = cli.log_dir.clone().or_else(|| cli.debug.then(|| config.log_dir()));
    let _guard = setup_logging(log_dir.as_deref(), cli.debug)?;

    info!("devhub starting");

    let client = GithubClient::new(&config.github)?;
    if !client.is_authenticated() {
        warn!("No GitHub token configured, requests are subject to the anonymous rate limit");
    }
    let github: Arc<dyn GithubSource> = Arc::new(client);

    let store = cache::open_store(&config)?;
    let gateway = CacheGateway::new(store, Arc::clone(&github));

    server::serve(AppState::new(gateway, github), &config.server).await
}

fn setup_logging(
    log_dir: Option<&std::path::Path>,
    debug: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let default_filter = if debug {
        "devhub=debug,tower_http=debug"
    } else {
        "devhub=info,tower_http=info"
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let Some(log_dir) = log_dir else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "devhub.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer())
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(Some(guard))
}
