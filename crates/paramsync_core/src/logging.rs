//! Logging bootstrap and panic capture.
//!
//! # Responsibility
//! - Initialize file-based rolling logs exactly once per process.
//! - Capture panics as sanitized `event=panic_captured` lines.
//!
//! # Invariants
//! - Init is idempotent for the same directory and level.
//! - Re-initialization with another directory or level is rejected.
//! - Initialization never panics.

use crate::config::LogConfig;
use crate::error::{SyncError, SyncResult};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "paramsync";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    log_dir: PathBuf,
    _logger: LoggerHandle,
}

/// Starts the rolling file logger described by `config`.
///
/// # Errors
/// - `Configuration` when the level is unsupported, the directory is empty,
///   relative or cannot be created, the backend fails to start, or logging
///   is already active with another directory or level.
pub fn init_logging(config: &LogConfig) -> SyncResult<()> {
    let level = normalize_level(&config.level)?;
    let log_dir = normalize_log_dir(&config.log_dir)?;

    let state = LOGGING_STATE.get_or_try_init(|| start_logger(level, &log_dir))?;
    if state.log_dir != log_dir {
        return Err(SyncError::configuration(format!(
            "logging already initialized at `{}`; refusing to switch to `{}`",
            state.log_dir.display(),
            log_dir.display()
        )));
    }
    if state.level != level {
        return Err(SyncError::configuration(format!(
            "logging already initialized with level `{}`; refusing to switch to `{level}`",
            state.level
        )));
    }
    Ok(())
}

fn start_logger(level: &'static str, log_dir: &Path) -> SyncResult<LoggingState> {
    std::fs::create_dir_all(log_dir).map_err(|err| {
        SyncError::configuration(format!(
            "failed to create log directory `{}`: {err}",
            log_dir.display()
        ))
    })?;

    let logger = Logger::try_with_str(level)
        .map_err(|err| SyncError::configuration(format!("invalid log level `{level}`: {err}")))?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        // [YYYY-MM-DD HH:MM:SS.ffffff TZ] LEVEL [module] file:line: message
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| SyncError::configuration(format!("failed to start logger: {err}")))?;

    install_panic_hook_once();
    info!(
        "event=logging_init module=logging status=ok level={level} log_dir={} version={}",
        log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(LoggingState {
        level,
        log_dir: log_dir.to_path_buf(),
        _logger: logger,
    })
}

/// Active `(level, log_dir)`, or `None` before `init_logging` succeeded.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.log_dir.clone()))
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn normalize_level(level: &str) -> SyncResult<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(SyncError::configuration(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        ))),
    }
}

fn normalize_log_dir(log_dir: &Path) -> SyncResult<PathBuf> {
    if log_dir.as_os_str().is_empty() {
        return Err(SyncError::configuration("log_dir cannot be empty"));
    }
    if !log_dir.is_absolute() {
        return Err(SyncError::configuration(format!(
            "log_dir must be an absolute path, got `{}`",
            log_dir.display()
        )));
    }
    Ok(log_dir.to_path_buf())
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.get().is_some() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_summary(panic_info);
        error!("event=panic_captured module=logging status=error location={location} payload={payload}");
        previous_hook(panic_info);
    }));

    let _ = PANIC_HOOK_INSTALLED.set(());
}

fn panic_payload_summary(info: &std::panic::PanicHookInfo<'_>) -> String {
    let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };

    sanitize_message(&payload, MAX_PANIC_PAYLOAD_CHARS)
}

/// Flattens line breaks and caps length; panic text may carry record values.
fn sanitize_message(value: &str, max_chars: usize) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}
