// src/main.rs

use chaindag::types::RunStatus;
use chaindag::{cli, logging, run};

/// Exit code when the run was cancelled (128 + SIGINT).
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(RunStatus::Succeeded) => {}
        Ok(RunStatus::Failed) => std::process::exit(1),
        Ok(RunStatus::Cancelled) => std::process::exit(EXIT_CANCELLED),
        Err(err) => {
            eprintln!("chaindag error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<RunStatus> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    Ok(run(args).await?)
}
