use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::models::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "dba-console.log";

/// Stdout for humans, daily-rolled JSON under `config.directory` for
/// tooling. Keep the returned guard alive or buffered file lines are lost.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.directory)?;

    let appender = tracing_appender::rolling::daily(&config.directory, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level))),
        )
        .with(fmt::layer().with_writer(std::io::stdout).with_ansi(true))
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .json(),
        )
        .try_init()?;

    info!(directory = %config.directory, level = %config.level, "logging initialized");
    Ok(guard)
}

fn default_directives(level: &str) -> String {
    format!("{level},tower_http=warn,hyper=warn,reqwest=warn")
}
