//! Error types for the settings crate.
//!
//! This module provides structured error types for loading the configuration
//! file and validating the values it contains.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// One or more configuration problems were found.
    #[error("Invalid configuration: {}", summarize(.0))]
    Invalid(Vec<ConfigError>),
}

impl SettingsError {
    /// The individual problems, when this is a validation failure.
    pub fn problems(&self) -> &[ConfigError] {
        match self {
            SettingsError::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

impl From<ConfigError> for SettingsError {
    fn from(err: ConfigError) -> Self {
        SettingsError::Invalid(vec![err])
    }
}

fn summarize(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors related to individual configuration entries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required configuration key is missing.
    #[error("Missing configuration key: {0}")]
    MissingKey(String),

    /// A key appears more than once.
    #[error("Duplicate configuration key '{key}' at line {line}")]
    DuplicateKey { key: String, line: usize },

    /// A key the configuration schema does not know.
    #[error("Unknown configuration key '{key}' at line {line}")]
    UnknownKey { key: String, line: usize },

    /// A line that is not a `key : value` pair.
    #[error("Malformed line {line}: {text}")]
    MalformedLine { line: usize, text: String },

    /// A value that cannot be read as the key's type.
    #[error("Invalid value for '{key}': expected {expected}, found '{value}'")]
    InvalidValue {
        key: String,
        expected: &'static str,
        value: String,
    },

    /// A configuration value is out of valid range.
    #[error("Value out of range for '{key}': {value} ({reason})")]
    ValueOutOfRange {
        key: String,
        value: String,
        reason: String,
    },

    /// The configuration file format is not supported.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

impl ConfigError {
    /// The key this problem is about, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::MissingKey(key) => Some(key),
            ConfigError::DuplicateKey { key, .. }
            | ConfigError::UnknownKey { key, .. }
            | ConfigError::InvalidValue { key, .. }
            | ConfigError::ValueOutOfRange { key, .. } => Some(key),
            ConfigError::MalformedLine { .. } | ConfigError::UnsupportedFormat(_) => None,
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
