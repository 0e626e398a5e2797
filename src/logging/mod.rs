pub mod config;
pub mod paths;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use config::LogConfig;

/// Initialize logging: compact console output on stderr, plus an optional
/// JSON application log rotated daily.
///
/// Keep the returned guard alive for as long as the file log should be
/// written; dropping it flushes and closes the file.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    // Console layer - RUST_LOG wins, then the configured filter
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .with_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.console_log_level)),
        );

    let (file_layer, guard, log_dir) = if config.file_enabled {
        let log_dir = paths::get_log_directory(config.custom_log_dir.as_deref())?;
        let appender = tracing_appender::rolling::daily(&log_dir, "application.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(EnvFilter::new(&config.file_log_level));

        (Some(layer), Some(guard), Some(log_dir))
    } else {
        (None, None, None)
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if let Some(dir) = log_dir {
        tracing::info!("Writing application log to {:?}", dir);
    }

    Ok(guard)
}

/// Log platform-specific information on startup
pub fn log_platform_info() {
    tracing::debug!(
        platform = std::env::consts::OS,
        architecture = std::env::consts::ARCH,
        version = env!("CARGO_PKG_VERSION"),
        "tts_relay starting"
    );
}
