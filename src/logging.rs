//! Tracing subscriber setup shared by the binaries.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogMode, RuntimeConfig};

/// Install the global subscriber. Keep the returned guard alive until exit
/// or buffered lines are lost.
///
/// # Errors
/// Returns error if the log file cannot be opened.
pub fn init_tracing(config: &RuntimeConfig) -> std::io::Result<WorkerGuard> {
    let (writer, guard) = match config.log_mode {
        LogMode::File => {
            if let Some(parent) = config.log_file.parent() {
                // Best-effort: don't fail startup just because the directory is missing.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.log_file)?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogMode::Auto => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .init();

    Ok(guard)
}
