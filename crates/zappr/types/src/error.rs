//! Error types for policy loading

use thiserror::Error;

/// Errors raised while loading or compiling a repository policy
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document could not be parsed into the policy model
    #[error("Invalid repository configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A regular expression in the policy does not compile
    #[error("Invalid pattern in '{field}': {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    /// A file glob in a group condition does not compile
    #[error("Invalid file glob in '{field}': {source}")]
    InvalidGlob {
        field: String,
        #[source]
        source: globset::Error,
    },
}

/// Result type for policy loading
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
