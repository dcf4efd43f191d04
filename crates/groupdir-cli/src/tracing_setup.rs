use std::fs::OpenOptions;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_ENV: &str = "GROUPDIR_LOG";
const LOG_FILE_ENV: &str = "GROUPDIR_LOG_FILE";

/// Install the global subscriber: warnings to stderr (`GROUPDIR_LOG` overrides
/// the filter), plus a DEBUG file log when `GROUPDIR_LOG_FILE` is set.
pub fn init_tracing() -> Result<()> {
    let stderr_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    if let Ok(log_path) = std::env::var(LOG_FILE_ENV) {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path))?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

        registry.with(file_layer).try_init()?;
        eprintln!("File logging enabled: {}", log_path);
    } else {
        registry.try_init()?;
    }
    Ok(())
}
