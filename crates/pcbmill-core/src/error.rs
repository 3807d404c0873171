//! Error handling for PcbMill
//!
//! Format errors raised by the input readers when Gerber or Excellon
//! content cannot be decoded. Uses `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Input format error type
///
/// Raised by the readers when an input file cannot be decoded into an image.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    /// The content did not look like any supported format
    #[error("Unrecognized input format: {reason}")]
    Unrecognized {
        /// Why detection failed.
        reason: String,
    },

    /// A statement could not be parsed
    #[error("Invalid statement at line {line}: {reason}")]
    InvalidStatement {
        /// The 1-based line number.
        line: usize,
        /// The reason the statement was rejected.
        reason: String,
    },

    /// A tool or aperture was used before being defined
    #[error("Undefined tool {tool} referenced at line {line}")]
    UndefinedTool {
        /// The tool or aperture number.
        tool: u32,
        /// The 1-based line number.
        line: usize,
    },

    /// The file contained no drawable content
    #[error("No drawable content found")]
    Empty,
}
