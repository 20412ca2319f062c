//! taskvault binary - composition root.
//!
//! Ties the crates together into one process:
//! 1. Resolve configuration (flags > env > TOML > defaults)
//! 2. Create the vault layout
//! 3. Start the Inbox watcher and intake
//! 4. Start the periodic plan producer over Needs_Action
//! 5. Start the executor loop over Approved
//! 6. On Ctrl-C, stop every loop and wait a bounded grace period

mod channels;
mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use taskvault_action::{ApprovedRunner, AuditLog, Executor};
use taskvault_core::{FsStageStore, OrchestratorConfig, Stage, StageStore, VaultLayout};
use taskvault_watch::{
    run_intake, ChecklistPlanner, DirectoryWatcher, Intake, ProducerLoop, ShutdownSignal,
    StabilityDetector,
};

use cli::CliArgs;

const AUDIT_FILE: &str = "audit.jsonl";

fn build_runner(
    config: &OrchestratorConfig,
    store: Arc<dyn StageStore>,
) -> ApprovedRunner {
    let audit_path = store.layout().dir(Stage::Logs).join(AUDIT_FILE);
    let audit = Arc::new(AuditLog::new(&config.audit).with_jsonl(audit_path));
    let registry = channels::dry_run_registry(
        &config.executor.record_tool,
        config.executor.primary_timeout(),
    );
    let executor = Arc::new(Executor::new(registry, audit));
    ApprovedRunner::new(store, executor, config.executor.scan_interval())
}

fn build_producer(config: &OrchestratorConfig, store: Arc<dyn StageStore>) -> ProducerLoop {
    let planner = Arc::new(ChecklistPlanner::new(Arc::clone(&store)));
    ProducerLoop::new(store, planner, config.producer.poll_interval())
}

/// Wait for every loop to finish, up to the shutdown grace period. A loop
/// that overruns is logged and left alone.
async fn join_loops(loops: Vec<(&'static str, JoinHandle<()>)>, grace: std::time::Duration) {
    let deadline = Instant::now() + grace;
    for (name, handle) in loops {
        match tokio::time::timeout_at(deadline, handle).await {
            Ok(Ok(())) => tracing::debug!(task = name, "Loop stopped"),
            Ok(Err(e)) => tracing::error!(task = name, error = %e, "Loop ended abnormally"),
            Err(_) => tracing::warn!(
                task = name,
                grace_secs = grace.as_secs(),
                "Loop did not stop within the grace period"
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config = args.resolve_config();

    // Tracing. RUST_LOG wins over the resolved level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting taskvault v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %args.resolve_config_path().display(), "Configuration resolved");

    // Vault.
    let layout = VaultLayout::new(&config.general.vault_path);
    if let Err(e) = layout.ensure() {
        tracing::error!(path = %layout.root().display(), error = %e, "Failed to create vault layout");
        return Err(e.into());
    }
    let store: Arc<dyn StageStore> = Arc::new(FsStageStore::new(layout.clone()));

    let producer = build_producer(&config, Arc::clone(&store));
    let runner = build_runner(&config, Arc::clone(&store));

    if args.once {
        producer.run_once().await;
        runner.run_once().await;
        return Ok(());
    }

    let shutdown = ShutdownSignal::new();

    // === Background loops ===

    let watcher = DirectoryWatcher::new(
        vec![layout.dir(Stage::Inbox)],
        &config.watcher,
        StabilityDetector::from_config(&config.stability),
    );
    let (events, watcher_handle) = watcher.spawn(shutdown.clone())?;
    let intake_handle = tokio::spawn(run_intake(
        events,
        Intake::new(Arc::clone(&store)),
        shutdown.clone(),
    ));

    let producer_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { producer.run(shutdown).await })
    };

    let runner_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { runner.run(shutdown).await })
    };

    tracing::info!(vault = %layout.root().display(), "All loops running, Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for Ctrl-C, shutting down");
    }
    tracing::info!("Shutdown requested");
    shutdown.trigger();

    join_loops(
        vec![
            ("watcher", watcher_handle),
            ("intake", intake_handle),
            ("producer", producer_handle),
            ("executor", runner_handle),
        ],
        config.shutdown.grace(),
    )
    .await;

    tracing::info!("taskvault stopped");
    Ok(())
}
