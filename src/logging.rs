use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

const DEFAULT_FILTER: &str = "info,agentflow=debug,sqlx=warn";
const LOG_FILE: &str = "agentflow.log";

fn log_dir() -> String {
    std::env::var("AGENTFLOW_LOG_DIR")
        .or_else(|_| std::env::var("LOG_DIR"))
        .unwrap_or_else(|_| "./logs".to_string())
}

/// `tracing_appender::rolling::daily` panics if it cannot create its first file,
/// so writability is checked up front
fn writable(dir: &str) -> std::result::Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    let marker = Path::new(dir).join(".agentflow_write_test");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&marker)
        .map_err(|e| e.to_string())?;
    let _ = std::fs::remove_file(&marker);
    Ok(())
}

/// Console plus daily rolling file logging. `RUST_LOG` overrides the filter.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.level.is_empty() || config.level == "info" {
            EnvFilter::new(DEFAULT_FILTER)
        } else {
            EnvFilter::new(format!("{},sqlx=warn", config.level))
        }
    });

    let dir = log_dir();
    let file_layer = match writable(&dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            // Flushes on drop; the process keeps it for its whole lifetime
            Box::leak(Box::new(guard));
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        Err(e) => {
            eprintln!(
                "Warning: Could not write to log directory {} ({}), file logging disabled",
                dir, e
            );
            None
        }
    };

    let console_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_logging_enabled = file_layer.is_some();
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if file_logging_enabled {
        eprintln!("Logging to: {}/{}", dir, LOG_FILE);
    }
}

/// Warnings only, for one-shot commands
pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
