//! Resonance Monitor server
//!
//! Accepts accelerometer readings from sensing devices over a WebSocket,
//! records them against the active test session and reports the measured
//! resonance of the cantilever when the session is stopped.
//!
//! # Usage
//!
//! ```bash
//! # Default: sled store under ./data, listening on 0.0.0.0:8080
//! cargo run --release
//!
//! # Throwaway run without touching disk
//! ./resonance-monitor --in-memory --addr 127.0.0.1:9000
//! ```
//!
//! # Environment Variables
//!
//! - `RESONANCE_CONFIG`: Path to a TOML config file
//! - `RESONANCE_SERVER_ADDR`: Bind address override
//! - `RESONANCE_CORS_ORIGINS`: Comma-separated dashboard origins
//! - `RUST_LOG`: Logging level (default: info)
//! - `RESET_DB`: Set to "true" to wipe the data directory on startup

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use resonance_monitor::config::{self, MonitorConfig, StorageBackend};
use resonance_monitor::{create_app, storage, MonitorState, SessionActor};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "resonance-monitor")]
#[command(about = "Cantilever vibration acquisition and resonance analysis server")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default: "0.0.0.0:8080")
    #[arg(short, long, env = "RESONANCE_SERVER_ADDR")]
    addr: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory holding the sled store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep sessions in memory only; nothing survives a restart
    #[arg(long)]
    in_memory: bool,

    /// Remove the data directory before opening the store.
    /// WARNING: This is destructive and cannot be undone!
    /// Can also be set via RESET_DB=true environment variable.
    #[arg(long)]
    reset_db: bool,
}

// ============================================================================
// Data Reset
// ============================================================================

/// Check whether a data reset was requested by flag or environment.
fn should_reset_db(cli_flag: bool) -> bool {
    if cli_flag {
        return true;
    }
    if let Ok(val) = std::env::var("RESET_DB") {
        let val_lower = val.to_lowercase();
        return val_lower == "true" || val_lower == "1" || val_lower == "yes";
    }
    false
}

/// Remove the data directory and all its contents.
fn reset_data_directory(data_path: &Path) -> Result<()> {
    if !data_path.exists() {
        info!("Data directory does not exist, nothing to reset");
        return Ok(());
    }

    warn!(path = %data_path.display(), "RESET_DB requested, wiping all persisted sessions");
    std::fs::remove_dir_all(data_path).context("Failed to remove data directory")?;
    info!("Data directory reset complete");
    Ok(())
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    SessionActor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::SessionActor => write!(f, "SessionActor"),
        }
    }
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Spawn the session actor into the JoinSet.
fn spawn_session_actor(task_set: &mut JoinSet<Result<TaskName>>, actor: SessionActor) {
    task_set.spawn(async move {
        info!("[SessionActor] Task starting");
        actor.run().await;
        info!("[SessionActor] Drained and stopped");
        Ok(TaskName::SessionActor)
    });
}

/// Wait for every task; the first failure cancels the rest.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut first_error: Option<anyhow::Error> = None;

    while let Some(joined) = task_set.join_next().await {
        match joined {
            Ok(Ok(task)) => {
                info!("[Supervisor] {} exited", task);
            }
            Ok(Err(e)) => {
                error!("[Supervisor] Task failed: {}", e);
                cancel_token.cancel();
                first_error.get_or_insert(e);
            }
            Err(e) => {
                error!("[Supervisor] Task panicked or was aborted: {}", e);
                cancel_token.cancel();
                first_error.get_or_insert(anyhow::anyhow!("task join error: {}", e));
            }
        }
        // Any exit means the server is going down
        cancel_token.cancel();
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut monitor_config = MonitorConfig::load(args.config.as_deref());
    if let Some(addr) = args.addr {
        monitor_config.server.addr = addr;
    }
    if let Some(dir) = args.data_dir {
        monitor_config.storage.data_dir = dir;
    }
    if args.in_memory {
        monitor_config.storage.backend = StorageBackend::Memory;
    }
    monitor_config
        .validate()
        .context("Invalid monitor configuration")?;

    // Reset check happens before any storage is opened
    if should_reset_db(args.reset_db) {
        reset_data_directory(&monitor_config.storage.data_dir)?;
    }

    config::init(monitor_config);
    let monitor_config = config::get();

    info!(
        addr = %monitor_config.server.addr,
        backend = ?monitor_config.storage.backend,
        debounce_ms = monitor_config.ingest.debounce_ms,
        "Resonance Monitor starting"
    );

    // Held until main returns
    let _process_lock = match monitor_config.storage.backend {
        StorageBackend::Sled => Some(
            storage::ProcessLock::acquire(&monitor_config.storage.data_dir)
                .context("Failed to acquire process lock")?,
        ),
        StorageBackend::Memory => None,
    };

    let gateway =
        storage::open_gateway(&monitor_config.storage).context("Failed to open session store")?;

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let (state, actor) = MonitorState::assemble(monitor_config, gateway, cancel_token.clone());
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&monitor_config.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", monitor_config.server.addr))?;
    info!(
        "Listening on {} (WebSocket at /ws, REST at /api/v1)",
        monitor_config.server.addr
    );

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_session_actor(&mut task_set, actor);
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    run_supervisor(&mut task_set, cancel_token).await?;

    info!("Resonance Monitor shutdown complete");
    Ok(())
}
