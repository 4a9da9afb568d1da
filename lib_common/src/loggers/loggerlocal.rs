use chrono::Local;
use glob::glob;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("I/O error while preparing log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

#[derive(Debug, Clone)]
/// # Logger Local Options
///
/// Controls where and how much the process logs.
pub struct LoggerLocalOptions {
    /// Default filter directive (e.g. "info", "debug", "lib_common=trace").
    /// `RUST_LOG`, when set, takes precedence.
    pub level: String,
    /// Whether to print to stdout.
    pub use_tty: bool,
    /// Directory for the log file. `None` disables file output.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggerLocalOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            use_tty: true,
            log_dir: None,
        }
    }
}

/// # Logger Local
///
/// Handle for the process-wide `tracing` subscriber. Keep it alive for the
/// life of the process: dropping it flushes and stops the file writer.
pub struct LoggerLocal {
    app_name: String,
    current_log_file: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

/// Keeps only the newest `<app_name>-*.log` file in `log_dir` and deletes
/// the rest. File names embed a sortable timestamp, so "newest" is simply
/// the greatest name.
///
/// Returns how many files were removed.
pub fn rotate_logs(app_name: &str, log_dir: &Path) -> usize {
    let pattern = format!("{}/{}-*.log", log_dir.display(), app_name);
    let mut log_files: Vec<PathBuf> = match glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).collect(),
        Err(e) => {
            eprintln!("Invalid log rotation pattern {}: {}", pattern, e);
            return 0;
        }
    };

    log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let mut removed = 0;
    for old_file in log_files.iter().skip(1) {
        match std::fs::remove_file(old_file) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Error deleting old log file {}: {}", old_file.display(), e),
        }
    }
    removed
}

/// Builds the level filter: `RUST_LOG` if present, otherwise `level`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

impl LoggerLocal {
    /// Installs the global subscriber for `app_name`.
    ///
    /// With a `log_dir`, the directory is created if needed, older logs of
    /// the same app are rotated away, and a fresh
    /// `<app_name>-<YYYYMMDD_HHMMSS>.log` is written through a non-blocking
    /// appender.
    pub fn init(app_name: &str, options: LoggerLocalOptions) -> Result<Self, LoggerError> {
        let tty_layer = options.use_tty.then(|| fmt::layer().with_target(true));

        let (file_layer, guard, current_log_file) = match &options.log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                rotate_logs(app_name, dir);

                let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
                let file_name = format!("{}-{}.log", app_name, timestamp);
                let appender = tracing_appender::rolling::never(dir, &file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);

                let layer = fmt::layer().with_ansi(false).with_writer(writer);
                (Some(layer), Some(guard), Some(dir.join(file_name)))
            }
            None => (None, None, None),
        };

        tracing_subscriber::registry()
            .with(build_filter(&options.level))
            .with(tty_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggerError::AlreadyInitialized(e.to_string()))?;

        tracing::info!(app = %app_name, file = ?current_log_file, "Logger initialized");

        Ok(Self {
            app_name: app_name.to_string(),
            current_log_file,
            _guard: guard,
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Path of the file this process is logging to, if file output is on.
    pub fn current_log_file(&self) -> Option<&Path> {
        self.current_log_file.as_deref()
    }
}
