//! Logging setup for the batch driver.
//!
//! Pipeline events carry `component` and `event` fields; everything goes to
//! stderr so stdout stays free for piping.

use std::env;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// `CLV_LOG_LEVEL`, `CLV_LOG_FORMAT`, `CLV_LOG_TARGET`. Values that do not
/// parse leave the default in place.
pub fn logging_config_from_env() -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Some(level) = env::var("CLV_LOG_LEVEL")
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
    {
        config.level = level;
    }
    if let Some(format) = env::var("CLV_LOG_FORMAT")
        .ok()
        .and_then(|raw| raw.parse::<LogFormat>().ok())
    {
        config.format = format;
    }
    if let Some(include_target) = env::var("CLV_LOG_TARGET")
        .ok()
        .and_then(|raw| parse_bool(&raw))
    {
        config.include_target = include_target;
    }

    config
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_writer(std::io::stderr)
        .with_ansi(matches!(config.format, LogFormat::Pretty));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_run_start(config: &LoggingConfig, mode: &str) {
    info!(
        component = "clv_features",
        event = "app.start",
        mode,
        log_level = %config.level,
        log_format = ?config.format
    );
}

pub fn log_source_selected(source: &str, input: &Path, table: Option<&str>) {
    match table {
        Some(table) => info!(
            component = "clv_features",
            event = "source.selected",
            source,
            input = %input.display(),
            table
        ),
        None => info!(
            component = "clv_features",
            event = "source.selected",
            source,
            input = %input.display()
        ),
    }
}

pub fn log_run_finish(mode: &str, output_dir: &Path, churned: usize, active: usize) {
    info!(
        component = "clv_features",
        event = "app.finish",
        mode,
        output_dir = %output_dir.display(),
        churned,
        active
    );
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn with_log_env<R>(
        level: Option<&str>,
        format: Option<&str>,
        target: Option<&str>,
        f: impl FnOnce() -> R,
    ) -> R {
        let _guard = env_lock().lock().expect("env lock should not be poisoned");
        let vars = [
            ("CLV_LOG_LEVEL", level),
            ("CLV_LOG_FORMAT", format),
            ("CLV_LOG_TARGET", target),
        ];
        let previous: Vec<(&str, Option<String>)> =
            vars.iter().map(|(key, _)| (*key, env::var(key).ok())).collect();

        for (key, value) in vars {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        let output = f();
        for (key, value) in previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        output
    }

    #[test]
    fn defaults_when_env_missing() {
        let cfg = with_log_env(None, None, None, logging_config_from_env);
        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn reads_json_level_and_target() {
        let cfg = with_log_env(
            Some("clv=debug"),
            Some("JSON"),
            Some("yes"),
            logging_config_from_env,
        );
        assert_eq!(cfg.level, "clv=debug");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(cfg.include_target);
    }

    #[test]
    fn unknown_values_fall_back() {
        let cfg = with_log_env(
            Some("  "),
            Some("yaml"),
            Some("maybe"),
            logging_config_from_env,
        );
        assert_eq!(cfg, LoggingConfig::default());
    }
}
