use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::data::ExperienceId;
use crate::util::paths::{config_path, data_dir};

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Database file name used when the config does not name one
pub const DEFAULT_DATABASE_FILE: &str = "recovery.db";

/// Log filter used when neither the config nor `RUST_LOG` sets one
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Database file, relative to the data directory unless absolute
    pub database_file: PathBuf,
    /// `tracing_subscriber` filter directives
    pub log_filter: String,
    /// Experience used by CLI commands that are not given one
    pub default_experience: Option<ExperienceId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct TomlConfig {
    database_file: Option<PathBuf>,
    log_filter: Option<String>,
    default_experience: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_file: PathBuf::from(DEFAULT_DATABASE_FILE),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            default_experience: None,
        }
    }
}

impl Config {
    /// Load config from the data directory, writing the example file on first run
    pub fn load() -> Self {
        let config_file = config_path();

        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file)
    }

    /// Load config from `path`; a missing or unreadable file yields defaults
    pub fn load_from(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No config file, using defaults");
                return Self::default();
            }
        };

        match Self::parse(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Invalid config file, using defaults");
                Self::default()
            }
        }
    }

    /// Parse config from TOML text, filling anything missing with defaults
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let toml_config: TomlConfig = toml::from_str(contents)?;
        let mut config = Config::default();

        if let Some(database_file) = toml_config.database_file {
            config.database_file = database_file;
        }
        if let Some(log_filter) = toml_config.log_filter {
            config.log_filter = log_filter;
        }
        if let Some(experience) = toml_config.default_experience {
            match ExperienceId::new(experience) {
                Ok(id) => config.default_experience = Some(id),
                Err(e) => tracing::warn!(error = %e, "Ignoring default_experience"),
            }
        }

        Ok(config)
    }

    /// Resolved database path
    pub fn database_path(&self) -> PathBuf {
        if self.database_file.is_absolute() {
            self.database_file.clone()
        } else {
            data_dir().join(&self.database_file)
        }
    }

    fn create_default_config(path: &Path) {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }

    pub fn with_database_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.database_file = file.into();
        self
    }

    pub fn with_default_experience(mut self, id: ExperienceId) -> Self {
        self.default_experience = Some(id);
        self
    }
}
