// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod external;
pub mod logging;
pub mod report;
pub mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{Collaborators, default_config_path, load_and_validate};
use crate::engine::run_workflow;
use crate::errors::Result;
use crate::types::RunStatus;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - workflow construction (listing dynamic group catalogs)
/// - the engine run
/// - Ctrl-C handling (cancels the run)
///
/// The report goes to stdout; the returned status decides the exit code.
pub async fn run(args: CliArgs) -> Result<RunStatus> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)?;
    debug!(path = ?config_path, "config loaded");

    let collaborators = Collaborators::from_backend(&cfg.backend);
    let workflow = cfg.workflow_builder(&collaborators)?.build().await?;

    if args.dry_run {
        print!("{}", workflow.describe());
        debug!("dry-run complete (no execution)");
        return Ok(RunStatus::Succeeded);
    }

    let mut options = cfg.run_options();
    if let Some(n) = args.max_concurrency {
        options.max_concurrency = n as usize;
    }

    // Ctrl-C → cancel the run.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            cancel.cancel();
        });
    }

    let report = run_workflow(Arc::new(workflow), options, cancel).await?;
    print!("{report}");
    Ok(report.status)
}
