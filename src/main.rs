//! sqlgrade - Grades student SQL queries by majority consensus.

use sqlgrade::cli::{Cli, Command};
use sqlgrade::config::{Config, GradeSettings};
use sqlgrade::db::DatabaseHandle;
use sqlgrade::error::Result;
use sqlgrade::grading::run_grading;
use sqlgrade::logging::{init_file_logging, init_stderr_logging, DEFAULT_FILTER, WORKER_FILTER};
use sqlgrade::query::{run_worker, IsolatedExecutor, WorkerCommand};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();

    let result = match &cli.command {
        Some(Command::Worker { database }) => {
            init_stderr_logging(WORKER_FILTER);
            run_worker(&DatabaseHandle::new(database)).await
        }
        None => run(&cli).await,
    };

    if let Err(e) = result {
        // No-op when a subscriber is already installed.
        init_stderr_logging(DEFAULT_FILTER);
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.log_file {
        Some(path) => init_file_logging(path)?,
        None => init_stderr_logging(DEFAULT_FILTER),
    }

    let settings = resolve_settings(cli)?;
    let executor = IsolatedExecutor::new(WorkerCommand::current_exe()?);

    let report = run_grading(&settings, &executor).await?;
    print!("{}", report.summary());
    Ok(())
}

/// Resolves settings with precedence: CLI flags, then the config file,
/// then built-in defaults.
fn resolve_settings(cli: &Cli) -> Result<GradeSettings> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());

    let mut config = Config::load_from_file(&config_path)?;
    config.merge(cli.to_config());
    config.resolve()
}
