//! Code templates with named placeholders.
//!
//! Templates are written by hand with names (`G0 Z{lift:0.000}`) and compiled
//! once into positional form (`G0 Z{2:0.000}`), so rendering only needs a
//! slice of values in a fixed order.

use crate::error::TemplateError;
use std::collections::HashMap;

/// Decimal places used when a number has no format specifier.
pub const DEFAULT_DECIMALS: usize = 4;

/// Rewrite `{name` into `{index` for every name found in `names`.
///
/// Only whole placeholder names are replaced (the name must be followed by
/// `}` or `:`), and any trailing format specifier is kept as written.
/// Unknown names are left untouched.
pub fn compile(template: &str, names: &HashMap<&str, usize>) -> String {
    let mut compiled = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        compiled.push_str(&rest[..=open]);
        rest = &rest[open + 1..];

        let name_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let (name, tail) = rest.split_at(name_len);
        let terminated = tail.starts_with('}') || tail.starts_with(':');
        match names.get(name) {
            Some(index) if terminated => {
                compiled.push_str(&index.to_string());
                rest = tail;
            }
            _ => {}
        }
    }
    compiled.push_str(rest);
    compiled
}

/// A value substituted into a compiled template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemplateValue {
    Number(f64),
    Integer(i64),
}

impl From<f64> for TemplateValue {
    fn from(value: f64) -> Self {
        TemplateValue::Number(value)
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        TemplateValue::Integer(value)
    }
}

impl From<u32> for TemplateValue {
    fn from(value: u32) -> Self {
        TemplateValue::Integer(i64::from(value))
    }
}

/// Format with a fixed number of decimals, never printing a negative zero.
pub fn format_number(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value);
    match text.strip_prefix('-') {
        Some(unsigned) if unsigned.chars().all(|c| c == '0' || c == '.') => unsigned.to_string(),
        _ => text,
    }
}

/// Decimal places requested by a specifier such as `0.000`, `#.##` or `F3`.
fn decimals_for(spec: &str) -> Result<usize, TemplateError> {
    let spec = spec.trim();
    if let Some(digits) = spec.strip_prefix(['F', 'f']) {
        return digits
            .parse::<usize>()
            .map_err(|_| TemplateError::InvalidSpecifier(spec.to_string()));
    }
    if spec.is_empty() || !spec.chars().all(|c| matches!(c, '0' | '#' | '.')) {
        return Err(TemplateError::InvalidSpecifier(spec.to_string()));
    }
    Ok(spec.split_once('.').map_or(0, |(_, fraction)| fraction.len()))
}

fn format_value(value: TemplateValue, spec: Option<&str>) -> Result<String, TemplateError> {
    match (value, spec) {
        (TemplateValue::Number(number), None) => Ok(format_number(number, DEFAULT_DECIMALS)),
        (TemplateValue::Integer(integer), None) => Ok(integer.to_string()),
        (TemplateValue::Number(number), Some(spec)) => Ok(format_number(number, decimals_for(spec)?)),
        (TemplateValue::Integer(integer), Some(spec)) => {
            Ok(format_number(integer as f64, decimals_for(spec)?))
        }
    }
}

/// Render a compiled template.
///
/// `{{` and `}}` produce literal braces. A placeholder whose content is not a
/// positional index is copied through unchanged.
pub fn render(compiled: &str, values: &[TemplateValue]) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(compiled.len() + 16);
    let mut chars = compiled.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                output.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                output.push('}');
            }
            '{' => {
                let start = position + 1;
                let end = compiled[start..]
                    .find('}')
                    .map(|offset| start + offset)
                    .ok_or(TemplateError::Unterminated(position))?;
                let inner = &compiled[start..end];
                let (index, spec) = match inner.split_once(':') {
                    Some((index, spec)) => (index, Some(spec)),
                    None => (inner, None),
                };
                match index.trim().parse::<usize>() {
                    Ok(index) => {
                        let value =
                            values
                                .get(index)
                                .copied()
                                .ok_or(TemplateError::MissingValue {
                                    index,
                                    available: values.len(),
                                })?;
                        output.push_str(&format_value(value, spec)?);
                    }
                    Err(_) => {
                        output.push('{');
                        output.push_str(inner);
                        output.push('}');
                    }
                }
                while let Some((next, _)) = chars.peek() {
                    if *next > end {
                        break;
                    }
                    chars.next();
                }
            }
            other => output.push(other),
        }
    }
    Ok(output)
}

/// A template compiled against a fixed, ordered list of placeholder names.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeTemplate {
    source: String,
    compiled: String,
    arity: usize,
}

impl CodeTemplate {
    /// Compile `source`; the position of each name in `names` is its index.
    pub fn new(source: &str, names: &[&str]) -> Self {
        let map: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(index, name)| (*name, index))
            .collect();
        Self {
            source: source.to_string(),
            compiled: compile(source, &map),
            arity: names.len(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn compiled(&self) -> &str {
        &self.compiled
    }

    /// Number of values `render` expects.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn render(&self, values: &[TemplateValue]) -> Result<String, TemplateError> {
        render(&self.compiled, values)
    }
}
