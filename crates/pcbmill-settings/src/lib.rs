//! # PcbMill Settings
//!
//! Loads the machine configuration that drives code generation. Two file
//! formats are accepted: the line-oriented `key : value` format read through
//! [`ConfigStore`], and TOML or JSON files deserialised straight into
//! [`MachineConfig`]. Either way every problem in the file is reported at once.

pub mod config;
pub mod error;
pub mod store;

pub use config::{MachineConfig, KNOWN_KEYS};
pub use error::{ConfigError, Result, SettingsError};
pub use store::ConfigStore;
