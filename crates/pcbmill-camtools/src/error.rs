//! Error types for the CAM tools crate.
//!
//! This module provides structured error types for template rendering,
//! machine output, geometry operations and input decoding.

use pcbmill_core::FormatError;
use std::io;
use thiserror::Error;

/// Errors that can occur during CAM tool operations.
#[derive(Error, Debug)]
pub enum CamToolError {
    /// Invalid parameters were provided to a CAM tool.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// A code template could not be rendered.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// A geometry operation failed during toolpath creation.
    #[error("Geometry error: {0}")]
    GeometryError(String),

    /// The input file could not be decoded.
    #[error("File format error: {0}")]
    FileFormat(#[from] FormatError),

    /// I/O error while writing the program.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Errors raised while rendering a compiled template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// A positional placeholder has no matching value.
    #[error("Placeholder {{{index}}} has no value ({available} supplied)")]
    MissingValue { index: usize, available: usize },

    /// A `{` was never closed.
    #[error("Unterminated placeholder at byte {0}")]
    Unterminated(usize),

    /// A format specifier that cannot be applied.
    #[error("Invalid format specifier '{0}'")]
    InvalidSpecifier(String),
}

/// Result type for CAM tool operations.
pub type Result<T> = std::result::Result<T, CamToolError>;
