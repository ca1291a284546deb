//! Tracing setup for the binary.

use std::path::{Path, PathBuf};

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{Error, Result};

/// Overrides the level chosen by `-v`/`-q`.
pub const LOG_FILTER_ENV: &str = "DOCSEARCH_LOG";

/// When set, log lines are also appended to this file.
pub const LOG_FILE_ENV: &str = "DOCSEARCH_LOG_FILE";

fn default_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if let Ok(env) = std::env::var(LOG_FILTER_ENV) {
        return EnvFilter::new(env);
    }
    if quiet {
        return EnvFilter::new("warn");
    }
    match verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Open `path` for appending, creating its directory if needed.
pub fn log_file_appender(path: &Path) -> Result<RollingFileAppender> {
    let log_error = |source: crate::error::BoxError| Error::LogFile {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| log_error("log file path has no file name".into()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| log_error(e.into()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(&dir)
        .map_err(|e| log_error(e.into()))
}

/// Log to stderr, and to `DOCSEARCH_LOG_FILE` when it is set.
///
/// stdout is left alone since the MCP transport owns it. The returned guard
/// flushes the file writer on drop and must outlive all logging.
pub fn init_tracing(verbose: u8, quiet: bool) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match std::env::var_os(LOG_FILE_ENV) {
        Some(path) => {
            let appender = log_file_appender(Path::new(&path))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(default_filter(verbose, quiet))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}
