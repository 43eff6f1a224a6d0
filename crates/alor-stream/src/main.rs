/*
[INPUT]:  CLI arguments, YAML configuration file, ALOR_* variables, OS shutdown signals
[OUTPUT]: Configured Alor streams logged until graceful shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use alor_adapter::{
    AlorClient, AlorWebSocket, AuthManager, ClientConfig, Environment, StreamConfig, TokenProvider,
};
use alor_stream::{RunnerConfig, StreamManager};

#[derive(Parser, Debug)]
#[command(name = "alor-stream", version, about = "Alor OpenAPI stream runner")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: PathBuf,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Use the demo servers regardless of the configured environment
    #[arg(long = "demo")]
    demo: bool,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    info!(
        config_path = %args.config_path.display(),
        dry_run = args.dry_run,
        "starting alor-stream"
    );

    let mut config = load_config(&args.config_path)?;
    if args.demo {
        config.environment = Environment::Demo;
    }
    let requests = config
        .requests(chrono::Utc::now().timestamp())
        .context("build subscription requests")?;
    info!(
        environment = ?config.environment,
        stream_count = requests.len(),
        "configuration loaded"
    );

    if args.dry_run {
        for request in &requests {
            info!(opcode = ?request.opcode(), params = ?request.params(), "would subscribe");
        }
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let client = AlorClient::with_config(ClientConfig {
        environment: config.environment,
        ..ClientConfig::default()
    })
    .context("build REST client")?;
    let auth: Arc<dyn TokenProvider> = Arc::new(AuthManager::new(client, &config.refresh_token));
    let ws = AlorWebSocket::new(StreamConfig::new(config.environment), auth);
    let mut manager = StreamManager::new(ws);

    let shutdown = manager.shutdown_token();
    setup_signal_handlers(shutdown.clone());

    info!("opening streams");
    let started = tokio::select! {
        started = manager.start(requests) => Some(started),
        _ = shutdown.cancelled() => None,
    };
    match started {
        Some(Ok(())) => info!(active = manager.active().len(), "streams started"),
        Some(Err(err)) => {
            warn!(error = ?err, "startup failed");
            manager.shutdown_and_wait().await.context("shutdown streams")?;
            return Err(err);
        }
        None => {}
    }

    shutdown.cancelled().await;
    info!("shutdown signal received");

    manager
        .shutdown_and_wait()
        .await
        .context("shutdown streams")?;
    info!("shutdown complete");

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: &PathBuf) -> Result<RunnerConfig> {
    let path_str = path
        .to_str()
        .context("config path must be valid utf-8")?;
    RunnerConfig::from_file(path_str).context("load config")
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
