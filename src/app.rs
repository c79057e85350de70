use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::application::CsvIngestionUseCase;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::ConfigService;

pub fn run() -> ExitCode {
    let config = ConfigService::from_environment();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let result = execute(&config);
    if let Err(e) = &result {
        let message = failure_message(e);
        error!("{}", message);
        // Printed even when RUST_LOG silences the subscriber
        eprintln!("{}", message);
    }
    ExitCode::from(exit_status(&result))
}

/// Load configuration, then run the whole ingestion on a current-thread runtime
fn execute(config: &ConfigService) -> Result<()> {
    let settings = config.load()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let use_case = CsvIngestionUseCase::new(settings.db, settings.load);
    runtime.block_on(use_case.run())?;
    Ok(())
}

fn failure_message(e: &AppError) -> String {
    format!("{} stage failed: {}", e.stage(), e)
}

fn exit_status(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}
