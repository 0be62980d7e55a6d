use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "etl.log";

/// Console output plus a daily-rotated JSON file under `logs/`.
///
/// `RUST_LOG` overrides the default `marketplace_etl=info` filter.
pub fn init_logging() {
    let dir_result = ensure_log_dir(Path::new(LOG_DIR));

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, LOG_FILE);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stdout);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("marketplace_etl=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    if let Err(e) = dir_result {
        warn!("Could not create log directory '{}': {}; file output may be lost", LOG_DIR, e);
    }

    // Flushes on drop, so it must outlive main
    std::mem::forget(guard);
}

/// Create the log directory, failing if the path exists as something else.
fn ensure_log_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} is not a directory", dir.display()),
        ));
    }
    Ok(())
}
