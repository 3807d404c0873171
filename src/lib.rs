//! # PcbMill
//!
//! Converts PCB artwork into CNC programs:
//! - Gerber RS-274X copper layers become multi-pass isolation routing
//! - Excellon drill files become per-tool drilling programs with slot support
//!
//! ## Architecture
//!
//! PcbMill is organized as a workspace with multiple crates:
//!
//! 1. **pcbmill-core** - Units, geometry primitives, the decoded image model
//! 2. **pcbmill-settings** - Machine configuration loading and validation
//! 3. **pcbmill-camtools** - Readers, geometry synthesis, G-code emitters
//! 4. **pcbmill** - Command line binary and the pipeline tying them together

pub mod pipeline;

pub use pipeline::{generate, run, RunSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Logs go to stderr so G-code written to stdout-like sinks stays clean.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
