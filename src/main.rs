#![forbid(unsafe_code)]

//! `pair-bridge`: connects a coding-agent session to a remote controller.
//!
//! Loads configuration, connects to the controller, starts the transport
//! tasks, and serves actions on a single-threaded event loop until the
//! controller disconnects or the process is signalled.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use pair_bridge::config::CliOverrides;
use pair_bridge::confirm::ConfirmationBroker;
use pair_bridge::coordinator::{Coordinator, CoordinatorParts};
use pair_bridge::engine::builtin::shell::{ShellLinter, ShellTestRunner};
use pair_bridge::engine::builtin::BuiltinEngine;
use pair_bridge::engine::{CommandStatusTestRunner, Engine, Linter, LoadingLinter};
use pair_bridge::io::ConnectorIo;
use pair_bridge::models::ModelRegistry;
use pair_bridge::protocol::Outbound;
use pair_bridge::transport::reader::{run_reader, InboundRouter};
use pair_bridge::transport::writer::run_writer;
use pair_bridge::transport::{self, Endpoint};
use pair_bridge::{AppError, GlobalConfig, Result};

/// Grace period for the writer to flush after the loop stops.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "pair-bridge", about = "Drive a coding-agent session from a remote controller", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Project root; overrides `base_dir` and `BASE_DIR`.
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Controller endpoint; overrides `server_url` and `CONNECTOR_SERVER_URL`.
    #[arg(long)]
    server_url: Option<String>,

    /// Reasoning effort for the main model.
    #[arg(long)]
    reasoning_effort: Option<String>,

    /// Thinking token budget for the main model (e.g. `8k`).
    #[arg(long)]
    thinking_tokens: Option<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("pair-bridge bootstrap");

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let overrides = CliOverrides {
        server_url: args.server_url,
        base_dir: args.base_dir,
        reasoning_effort: args.reasoning_effort,
        thinking_tokens: args.thinking_tokens,
    };
    let config = GlobalConfig::resolve(args.config.as_deref(), overrides)?;
    info!(base_dir = %config.base_dir.display(), "configuration loaded");

    // ── Connect ─────────────────────────────────────────
    let endpoint = Endpoint::parse(&config.server_url)?;
    let (reader, writer) = transport::connect(&endpoint).await?;

    let (outbound, frames) = Outbound::channel();
    let broker = Arc::new(ConfirmationBroker::new());
    let interrupt = Arc::new(AtomicBool::new(false));
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let router = InboundRouter::new(
        Arc::clone(&broker),
        Arc::clone(&interrupt),
        queue_tx,
        outbound.clone(),
    );
    let shutdown = CancellationToken::new();

    // ── Start transport tasks ───────────────────────────
    let writer_handle = tokio::spawn(run_writer(writer, frames));
    let reader_handle = tokio::spawn(run_reader(reader, router.clone(), shutdown.clone()));
    let signal_handle = tokio::spawn(watch_signals(router, shutdown.clone()));

    // ── Build the coordination core ─────────────────────
    let io = Arc::new(ConnectorIo::new(outbound, broker, &config.io));
    let models = Arc::new(ModelRegistry::new(&config.models, &config.engine.api_key_env));
    let engine = build_engine(&config)?;

    let mut coordinator = Coordinator::new(CoordinatorParts {
        config,
        engine,
        io,
        models,
        interrupt,
    })?;

    coordinator.announce().await;
    info!("bridge ready");
    coordinator.run(queue_rx, shutdown.clone()).await;

    // ── Shut down ───────────────────────────────────────
    drop(coordinator);
    shutdown.cancel();
    signal_handle.abort();
    if let Err(err) = reader_handle.await {
        warn!(%err, "reader task ended abnormally");
    }

    match tokio::time::timeout(FLUSH_TIMEOUT, writer_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => warn!(%err, "writer stopped with an error"),
        Ok(Err(err)) => error!(%err, "writer task ended abnormally"),
        Err(_) => warn!("timed out flushing outbound frames"),
    }

    info!("pair-bridge shut down");
    Ok(())
}

fn build_engine(config: &GlobalConfig) -> Result<Arc<dyn Engine>> {
    let linter: Option<Box<dyn Linter>> = config
        .engine
        .lint_cmd
        .clone()
        .map(|cmd| Box::new(LoadingLinter::new(ShellLinter::new(cmd))) as Box<dyn Linter>);
    let tests = Box::new(CommandStatusTestRunner::new(ShellTestRunner));

    let engine = BuiltinEngine::new(&config.engine, linter, tests)?;
    Ok(Arc::new(engine))
}

/// Treat SIGINT/SIGTERM like a controller disconnect.
async fn watch_signals(router: InboundRouter, shutdown: CancellationToken) {
    tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            router.disconnect();
            shutdown.cancel();
        }
        () = shutdown.cancelled() => {}
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
