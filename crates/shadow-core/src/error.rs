//! Error types for shadow-core
//!
//! Centralized error handling using `thiserror` for ergonomic error definitions.

use thiserror::Error;

/// Main error type for shadow-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path to the missing config file
        path: String,
    },

    /// Configuration path exists but is not a regular file
    #[error("Configuration path is not a file: {path}")]
    NotAFile {
        /// Offending path
        path: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    ConfigValue {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// An IP range rule could not be parsed
    #[error("Invalid CIDR rule '{cidr}': {source}")]
    InvalidCidr {
        /// The rule as written in the configuration
        cidr: String,
        /// Parser error
        #[source]
        source: ipnet::AddrParseError,
    },

    /// A domain rule is empty or contains an empty label
    #[error("Invalid domain rule '{domain}'")]
    InvalidDomain {
        /// The rule as written in the configuration
        domain: String,
    },

    /// Unknown verdict token
    #[error("Invalid verdict '{token}' (expected proxy, direct or blocked)")]
    InvalidVerdict {
        /// The token that failed to parse
        token: String,
    },

    /// Resource registered after shutdown
    #[error("Supervisor is already closed")]
    SupervisorClosed,

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a config value error
    pub fn config_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an invalid domain error
    pub fn invalid_domain(domain: impl Into<String>) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
        }
    }
}
