//! Configuration for zappr-eval

use serde::{Deserialize, Serialize};

/// Evaluation tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Repository id used for PR records
    #[serde(default = "default_repository_id")]
    pub repository_id: i64,

    /// Token handed to the GitHub collaborator
    #[serde(default)]
    pub token: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            repository_id: default_repository_id(),
            token: String::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_repository_id() -> i64 {
    1
}

impl EvalConfig {
    /// Load configuration: defaults, then the optional file, then `ZAPPR_*`
    /// environment variables
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&EvalConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ZAPPR")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
