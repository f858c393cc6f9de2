use anyhow::Result;
use std::env;
use tracing::{warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub fn init_logging() -> Result<()> {
    use tracing_appender::rolling;

    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    // DESKBRIDGE_LOG_DIR overrides the platform data dir; temp dir is the
    // last resort on systems without one.
    let log_dir = if let Ok(custom_dir) = env::var("DESKBRIDGE_LOG_DIR") {
        std::path::PathBuf::from(custom_dir)
    } else {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("deskbridge")
            .join("logs")
    };

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        warn!("Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "deskbridge-agent.log");

    // Two layers: stderr for interactive runs, a rolling daily file for
    // everything else. Stdout stays untouched.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env().add_directive(log_level.into())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(false)
                .with_file(true)
                .with_line_number(true)
                .with_filter(EnvFilter::from_default_env().add_directive(log_level.into())),
        )
        .init();

    Ok(())
}
