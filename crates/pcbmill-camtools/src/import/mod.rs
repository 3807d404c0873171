//! Input readers: Gerber and Excellon text into an [`Image`].

pub mod excellon;
pub mod gerber;

pub use excellon::read_excellon;
pub use gerber::read_gerber;

use anyhow::{Context, Result};
use pcbmill_core::{FormatError, Image};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Gerber,
    Excellon,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Gerber => write!(f, "Gerber"),
            InputKind::Excellon => write!(f, "Excellon"),
        }
    }
}

impl InputKind {
    /// Classify by content: an `M48` header or a tool table means Excellon,
    /// `%` parameter blocks or D-codes mean Gerber.
    pub fn detect(content: &str) -> Option<Self> {
        let mut gerber = false;
        for line in content.lines().map(str::trim) {
            if line == "M48" || is_tool_definition(line) {
                return Some(InputKind::Excellon);
            }
            if line.starts_with("%FS") || line.starts_with("%MO") || line.starts_with("%AD") {
                gerber = true;
            }
        }
        gerber.then_some(InputKind::Gerber)
    }
}

fn is_tool_definition(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('T') else {
        return false;
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && rest[digits..].starts_with('C')
}

/// Detect the format of `content` and decode it.
pub fn read_str(content: &str) -> std::result::Result<(Image, InputKind), FormatError> {
    let kind = InputKind::detect(content).ok_or_else(|| FormatError::Unrecognized {
        reason: "neither Gerber parameter blocks nor an Excellon header found".to_string(),
    })?;
    let image = match kind {
        InputKind::Gerber => read_gerber(content)?,
        InputKind::Excellon => read_excellon(content)?,
    };
    Ok((image, kind))
}

/// Read and decode an input file.
pub fn read_file(path: &Path) -> Result<(Image, InputKind)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    let (image, kind) =
        read_str(&content).with_context(|| format!("Failed to decode {}", path.display()))?;
    info!(
        "Loaded {} file {} ({} unit, {} net(s))",
        kind,
        path.display(),
        image.unit,
        image.nets.len()
    );
    Ok((image, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(InputKind::detect("M48\nMETRIC\n"), Some(InputKind::Excellon));
        assert_eq!(InputKind::detect("T01C0.8\n"), Some(InputKind::Excellon));
        assert_eq!(
            InputKind::detect("%FSLAX26Y26*%\n%MOMM*%\n"),
            Some(InputKind::Gerber)
        );
        assert_eq!(InputKind::detect("hello\n"), None);
    }

    #[test]
    fn test_unrecognized() {
        assert!(matches!(
            read_str("G1 X0 Y0\n"),
            Err(FormatError::Unrecognized { .. })
        ));
    }
}
