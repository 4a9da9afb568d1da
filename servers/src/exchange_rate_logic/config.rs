use clap::Parser;
use lib_common::core::PreloadWindow;
use lib_common::loggers::LoggerLocalOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "server_exchange_rate.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Exchange rate cache WebSocket server", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "RATES_PORT", help = "Port to listen on for client connections.")]
    pub port: Option<u16>,

    #[clap(long, env = "RATES_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "RATES_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "RATES_LOG_LEVEL", help = "Logging level or filter directive (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "DATABASE_URL", help = "PostgreSQL connection string for the preload.")]
    pub database_url: Option<String>,

    #[clap(long, env = "RATES_DB_POOL_SIZE", help = "Maximum pooled database connections.")]
    pub db_pool_size: Option<usize>,

    #[clap(long, env = "RATES_DATASET", help = "Schema holding the exchange rate table.")]
    pub dataset: Option<String>,

    #[clap(long, env = "RATES_TABLE", help = "Exchange rate table name.")]
    pub table: Option<String>,

    #[clap(long, env = "RATES_PRELOAD_START", help = "First trade date (YYYYMMDD) to preload, inclusive.")]
    pub preload_start: Option<String>,

    #[clap(long, env = "RATES_PRELOAD_END", help = "Last trade date (YYYYMMDD) to preload, inclusive.")]
    pub preload_end: Option<String>,

    #[clap(long, env = "RATES_PLUGIN_NAME", help = "Routing name clients address in pluginArg.name.")]
    pub plugin_name: Option<String>,

    #[clap(long, env = "RATES_LOAD_TIMEOUT_SECONDS", help = "Seconds to wait for the preload query (0 disables the limit).")]
    pub load_timeout_seconds: Option<u64>,
}

/// Fully resolved settings the server runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub database_url: Option<String>,
    pub db_pool_size: usize,
    pub window: PreloadWindow,
    pub plugin_name: String,
    pub load_timeout: Option<Duration>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("preload window is inverted: start {start} is after end {end}")]
    InvertedWindow { start: String, end: String },

    #[error("plugin name must not be empty")]
    EmptyPluginName,

    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

fn is_date_key(value: &str) -> bool {
    value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit())
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            database_url: other.database_url.or(self.database_url),
            db_pool_size: other.db_pool_size.or(self.db_pool_size),
            dataset: other.dataset.or(self.dataset),
            table: other.table.or(self.table),
            preload_start: other.preload_start.or(self.preload_start),
            preload_end: other.preload_end.or(self.preload_end),
            plugin_name: other.plugin_name.or(self.plugin_name),
            load_timeout_seconds: other.load_timeout_seconds.or(self.load_timeout_seconds),
        }
    }

    pub fn defaults() -> Config {
        Config {
            port: Some(9002),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            db_pool_size: Some(4),
            dataset: Some("sunjq".to_string()),
            table: Some("hk_exchange_rate".to_string()),
            preload_start: Some("20250101".to_string()),
            preload_end: Some("20251128".to_string()),
            plugin_name: Some("Exchange_rate".to_string()),
            load_timeout_seconds: Some(30),
            ..Default::default()
        }
    }

    /// Logger settings, available before [`Config::resolve`] so that
    /// validation warnings reach the log.
    pub fn logger_options(&self) -> LoggerLocalOptions {
        LoggerLocalOptions {
            level: self.log_level.clone().unwrap_or_else(|| "info".to_string()),
            use_tty: true,
            log_dir: Some(self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))),
        }
    }

    /// Turns a merged config into concrete settings.
    ///
    /// Date bounds that are not eight digits are accepted with a warning;
    /// comparisons stay plain string comparisons either way.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let start = self.preload_start.ok_or(ConfigError::Missing("preload_start"))?;
        let end = self.preload_end.ok_or(ConfigError::Missing("preload_end"))?;
        if start > end {
            return Err(ConfigError::InvertedWindow { start, end });
        }
        for bound in [&start, &end] {
            if !is_date_key(bound) {
                tracing::warn!(bound = %bound, "Preload bound is not an 8-digit YYYYMMDD key");
            }
        }

        let plugin_name = self.plugin_name.ok_or(ConfigError::Missing("plugin_name"))?;
        if plugin_name.trim().is_empty() {
            return Err(ConfigError::EmptyPluginName);
        }

        let window = PreloadWindow::new(
            self.dataset.ok_or(ConfigError::Missing("dataset"))?,
            self.table.ok_or(ConfigError::Missing("table"))?,
            start,
            end,
        );

        Ok(Settings {
            port: self.port.ok_or(ConfigError::Missing("port"))?,
            log_dir: self.log_dir.ok_or(ConfigError::Missing("log_dir"))?,
            log_level: self.log_level.unwrap_or_else(|| "info".to_string()),
            database_url: self.database_url.filter(|url| !url.trim().is_empty()),
            db_pool_size: self.db_pool_size.unwrap_or(4).max(1),
            window,
            plugin_name,
            load_timeout: self
                .load_timeout_seconds
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            path.display()
        );
        return None;
    }
    let Ok(config_str) = fs::read_to_string(path) else {
        tracing::warn!("Failed to read config file: {}. Falling back to other sources.", path.display());
        return None;
    };
    match serde_json::from_str::<Config>(&config_str) {
        Ok(file_config) => Some(file_config),
        Err(e) => {
            tracing::warn!(
                "Failed to parse config file: {} ({}). Falling back to other sources.",
                path.display(),
                e
            );
            None
        }
    }
}

/// Layers defaults, the JSON config file and `cli` (which already carries
/// environment values), later sources winning.
pub fn load_config_from(cli: Config) -> Config {
    // 1. Defaults
    let mut current_config = Config::defaults();

    // 2. Config file, whose path may itself come from the CLI/env.
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }

    // 3. Environment variables and CLI arguments
    current_config.merge(cli)
}

pub fn load_config() -> Config {
    load_config_from(Config::parse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cli_with_file(path: &Path) -> Config {
        Config {
            config_path: Some(path.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_resolve_to_the_stock_window() {
        let settings = Config::defaults().resolve().unwrap();
        assert_eq!(settings.port, 9002);
        assert_eq!(settings.plugin_name, "Exchange_rate");
        assert_eq!(settings.window, PreloadWindow::new("sunjq", "hk_exchange_rate", "20250101", "20251128"));
        assert_eq!(settings.load_timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.db_pool_size, 4);
        assert_eq!(settings.database_url, None);
    }

    #[test]
    fn file_overrides_defaults_and_cli_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"port": 9100, "table": "fx_rates", "preloadStart": "20240101", "databaseUrl": "postgres://file"}}"#
        )
        .unwrap();

        let mut cli = cli_with_file(file.path());
        cli.port = Some(9200);

        let merged = load_config_from(cli);
        assert_eq!(merged.port, Some(9200));
        assert_eq!(merged.table.as_deref(), Some("fx_rates"));
        assert_eq!(merged.preload_start.as_deref(), Some("20240101"));
        assert_eq!(merged.preload_end.as_deref(), Some("20251128"));
        assert_eq!(merged.database_url.as_deref(), Some("postgres://file"));
    }

    #[test]
    fn unreadable_or_missing_file_falls_back_to_defaults() {
        let mut bad = NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        assert_eq!(load_config_from(cli_with_file(bad.path())).port, Some(9002));

        let missing = cli_with_file(Path::new("/nonexistent/server_exchange_rate.conf"));
        assert_eq!(load_config_from(missing).table.as_deref(), Some("hk_exchange_rate"));
    }

    #[test]
    fn logger_options_come_from_the_unresolved_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"logLevel": "debug", "logDir": "/tmp/rates-logs", "preloadStart": "2025"}}"#).unwrap();

        let merged = load_config_from(cli_with_file(file.path()));
        let options = merged.logger_options();
        assert_eq!(options.level, "debug");
        assert_eq!(options.log_dir, Some(PathBuf::from("/tmp/rates-logs")));
        assert!(options.use_tty);

        let bare = Config::default().logger_options();
        assert_eq!(bare.level, "info");
        assert_eq!(bare.log_dir, Some(PathBuf::from("./logs")));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let config = Config {
            preload_start: Some("20251201".into()),
            preload_end: Some("20250101".into()),
            ..Config::defaults()
        };
        assert_eq!(
            config.resolve(),
            Err(ConfigError::InvertedWindow {
                start: "20251201".into(),
                end: "20250101".into()
            })
        );
    }

    #[test]
    fn odd_bounds_and_zero_timeout_are_accepted() {
        let config = Config {
            preload_start: Some("2025".into()),
            load_timeout_seconds: Some(0),
            db_pool_size: Some(0),
            database_url: Some("  ".into()),
            ..Config::defaults()
        };
        let settings = config.resolve().unwrap();
        assert_eq!(settings.window.start, "2025");
        assert_eq!(settings.load_timeout, None);
        assert_eq!(settings.db_pool_size, 1);
        assert_eq!(settings.database_url, None);
    }

    #[test]
    fn blank_plugin_name_is_rejected() {
        let config = Config {
            plugin_name: Some(" ".into()),
            ..Config::defaults()
        };
        assert_eq!(config.resolve(), Err(ConfigError::EmptyPluginName));
    }

    #[test]
    fn cli_flags_parse() {
        let cli = Config::try_parse_from(["server_exchange_rate", "--port", "9300", "--preload-end", "20251231"]).unwrap();
        assert_eq!(cli.port, Some(9300));
        assert_eq!(cli.preload_end.as_deref(), Some("20251231"));
    }
}
