use crate::compiler::analysis::variance::Variance;
use crate::compiler::errors::ConfigError;
use crate::infrastructure::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_NAMES: [&str; 2] = [".typsubstrc", ".typsubstrc.toml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub substitution: SubstitutionConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default = "default_false")]
    pub span_events: bool,

    /// Extra filter directives, e.g. `typsubst=trace`.
    #[serde(default)]
    pub filter: Option<String>,

    /// Log to daily files in this directory instead of stderr.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionConfig {
    #[serde(default)]
    pub ambient: Variance,

    #[serde(default = "default_false")]
    pub show_redundant_variance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Worker threads; `None` uses the global rayon pool.
    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default = "default_true")]
    pub memoize: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            span_events: false,
            filter: None,
            directory: None,
        }
    }
}

impl Default for SubstitutionConfig {
    fn default() -> Self {
        Self {
            ambient: Variance::Invariant,
            show_redundant_variance: false,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: None,
            memoize: true,
        }
    }
}

fn default_true() -> bool { true }
fn default_false() -> bool { false }
fn default_level() -> String { "warn".to_string() }

impl Config {
    /// Load configuration from a `.typsubstrc` file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Find and load the nearest configuration file, walking up from `start`.
    /// Files that fail to load are skipped.
    pub fn discover_from(start: &Path) -> Self {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            for name in CONFIG_NAMES {
                let config_path = dir.join(name);
                if config_path.exists() {
                    match Self::load(&config_path) {
                        Ok(config) => return config,
                        Err(e) => {
                            tracing::warn!(path = %config_path.display(), error = %e, "ignoring config file")
                        }
                    }
                }
            }
            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    /// Find and load configuration file from current directory or parents
    pub fn discover() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::discover_from(&dir),
            Err(_) => Self::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }
        if self.batch.workers == Some(0) {
            return Err(ConfigError::Invalid("batch.workers must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Generate default configuration file content
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
