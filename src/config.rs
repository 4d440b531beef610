use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tour::builtin::CatalogKind;
use crate::tour::TourTiming;

/// Project-local config file, looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "pik-tour.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tour: TourConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourConfig {
    /// Milliseconds between editor reads while a gated step waits (default: 500)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Milliseconds between detection and the automatic advance (default: 800)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Built-in tour to run
    #[serde(default)]
    pub catalog: CatalogKind,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_settle_delay_ms() -> u64 {
    800
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            catalog: CatalogKind::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to a file instead of stderr
    #[serde(default)]
    pub to_file: bool,

    /// Directory for log files when `to_file` is set
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    ".pik-tour/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
            dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Load configuration, later layers overriding earlier ones:
    /// defaults, user config, project config, `config_path`, then
    /// `PIK_TOUR__SECTION__KEY` environment variables.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Embedded defaults so the tour works without any config file
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // User config in ~/.config/pik-tour/
        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Project config in the working directory
        let project_config = PathBuf::from(PROJECT_CONFIG_FILE);
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(Path::new(path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PIK_TOUR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the per-user config file
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pik-tour").join("config.toml"))
    }

    /// Reject values the tour engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tour.poll_interval_ms == 0 {
            bail!("tour.poll_interval_ms must be greater than zero");
        }
        if self.tour.settle_delay_ms == 0 {
            bail!("tour.settle_delay_ms must be greater than zero");
        }
        Ok(())
    }

    /// Controller timing derived from the `tour` section
    pub fn timing(&self) -> Result<TourTiming> {
        TourTiming::new(
            Duration::from_millis(self.tour.poll_interval_ms),
            Duration::from_millis(self.tour.settle_delay_ms),
        )
        .context("Invalid tour timing")
    }

    /// Serialize as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config to TOML")
    }

    /// Save config to `path`, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create config directory")?;
            }
        }

        std::fs::write(path, self.to_toml()?).context("Failed to write config file")?;

        Ok(())
    }

    /// Absolute path to the logs directory
    pub fn logs_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.logging.dir);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tour.poll_interval_ms, 500);
        assert_eq!(config.tour.settle_delay_ms, 800);
        assert_eq!(config.tour.catalog, CatalogKind::Interactive);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.to_file);

        let timing = config.timing().unwrap();
        assert_eq!(timing.poll_interval(), Duration::from_millis(500));
        assert_eq!(timing.settle_delay(), Duration::from_millis(800));
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[tour]\nsettle_delay_ms = 600\ncatalog = \"overview\"\n",
        )
        .unwrap();

        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.tour.settle_delay_ms, 600);
        assert_eq!(config.tour.catalog, CatalogKind::Overview);
        // Untouched keys keep their defaults
        assert_eq!(config.tour.poll_interval_ms, 500);
    }

    #[test]
    fn test_zero_timing_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zero.toml");
        std::fs::write(&path, "[tour]\npoll_interval_ms = 0\n").unwrap();

        let err = Config::load(Some(path.to_str().unwrap())).unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));

        let mut config = Config::default();
        config.tour.settle_delay_ms = 0;
        assert!(config.validate().is_err());
        assert!(config.timing().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("pik-tour.toml");

        let mut config = Config::default();
        config.tour.poll_interval_ms = 250;
        config.logging.to_file = true;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded.tour.poll_interval_ms, 250);
        assert!(loaded.logging.to_file);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Config::load(Some(path.to_str().unwrap())).is_err());
    }
}
