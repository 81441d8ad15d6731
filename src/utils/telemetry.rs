//! Logging Setup
//!
//! Centralized `tracing` subscriber initialisation: env-filtered console
//! output, plus an optional daily-rolling log file.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Keeps the non-blocking file writer alive. Drop it last.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// `RUST_LOG` wins over `default_filter` when set.
pub fn init_logging(default_filter: &str, log_dir: Option<&str>) -> LogGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "moral_bell.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);

            let _ = Registry::default()
                .with(filter)
                .with(console)
                .with(file)
                .try_init();
            LogGuard { _file: Some(guard) }
        }
        None => {
            let _ = Registry::default().with(filter).with(console).try_init();
            LogGuard { _file: None }
        }
    }
}
