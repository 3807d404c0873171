//! Line-oriented `key : value` configuration store.
//!
//! Blank lines and lines starting with `#`, `/`, `+` or `-` are ignored.
//! Each remaining line is split at its first colon, so values may contain
//! colons themselves (format specifiers in code templates do).

use crate::error::{ConfigError, Result, SettingsError};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

const COMMENT_PREFIXES: [char; 4] = ['#', '/', '+', '-'];

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    value: String,
    line: usize,
}

/// Parsed configuration entries with typed accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigStore {
    entries: BTreeMap<String, Entry>,
}

impl ConfigStore {
    /// Parse configuration text, collecting every malformed line and duplicate key.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries: BTreeMap<String, Entry> = BTreeMap::new();
        let mut errors = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIXES) {
                continue;
            }

            let Some((key, value)) = trimmed.split_once(':') else {
                errors.push(ConfigError::MalformedLine {
                    line,
                    text: trimmed.to_string(),
                });
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                errors.push(ConfigError::MalformedLine {
                    line,
                    text: trimmed.to_string(),
                });
                continue;
            }

            if entries.contains_key(key) {
                errors.push(ConfigError::DuplicateKey {
                    key: key.to_string(),
                    line,
                });
                continue;
            }
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.trim().to_string(),
                    line,
                },
            );
        }

        if errors.is_empty() {
            Ok(Self { entries })
        } else {
            Err(SettingsError::Invalid(errors))
        }
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys with the line they were defined on, in key order.
    pub fn keys(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.line))
    }

    /// Raw value, without escape decoding.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.value.as_str())
    }

    /// Required string with `\n`, `\r`, `\t` and `\\` decoded.
    pub fn string(&self, key: &str) -> std::result::Result<String, ConfigError> {
        self.optional_string(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn optional_string(&self, key: &str) -> Option<String> {
        self.raw(key).map(decode_escapes)
    }

    pub fn int(&self, key: &str) -> std::result::Result<i64, ConfigError> {
        self.required(key, Self::optional_int)
    }

    pub fn optional_int(&self, key: &str) -> std::result::Result<Option<i64>, ConfigError> {
        self.parse_value(key, "integer")
    }

    pub fn double(&self, key: &str) -> std::result::Result<f64, ConfigError> {
        self.required(key, Self::optional_double)
    }

    pub fn optional_double(&self, key: &str) -> std::result::Result<Option<f64>, ConfigError> {
        let value: Option<f64> = self.parse_value(key, "number")?;
        match value {
            Some(number) if !number.is_finite() => Err(self.invalid(key, "finite number")),
            other => Ok(other),
        }
    }

    pub fn bool(&self, key: &str) -> std::result::Result<bool, ConfigError> {
        self.required(key, Self::optional_bool)
    }

    pub fn optional_bool(&self, key: &str) -> std::result::Result<Option<bool>, ConfigError> {
        let Some(raw) = self.raw(key) else {
            return Ok(None);
        };
        match raw.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(self.invalid(key, "boolean")),
        }
    }

    /// Comma separated list of numbers.
    pub fn double_list(&self, key: &str) -> std::result::Result<Vec<f64>, ConfigError> {
        self.required(key, Self::optional_double_list)
    }

    pub fn optional_double_list(
        &self,
        key: &str,
    ) -> std::result::Result<Option<Vec<f64>>, ConfigError> {
        let Some(raw) = self.raw(key) else {
            return Ok(None);
        };
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                item.parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| self.invalid(key, "comma separated numbers"))
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Parse with `FromStr`; `T::Err` is discarded in favour of the key context.
    pub fn parse_value<T: FromStr>(
        &self,
        key: &str,
        expected: &'static str,
    ) -> std::result::Result<Option<T>, ConfigError> {
        match self.raw(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| self.invalid(key, expected)),
        }
    }

    fn required<T>(
        &self,
        key: &str,
        read: impl Fn(&Self, &str) -> std::result::Result<Option<T>, ConfigError>,
    ) -> std::result::Result<T, ConfigError> {
        read(self, key)?.ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    fn invalid(&self, key: &str, expected: &'static str) -> ConfigError {
        ConfigError::InvalidValue {
            key: key.to_string(),
            expected,
            value: self.raw(key).unwrap_or_default().to_string(),
        }
    }
}

/// Decode the escape sequences allowed in string values.
pub fn decode_escapes(raw: &str) -> String {
    let mut decoded = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            decoded.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => decoded.push('\n'),
            Some('r') => decoded.push('\r'),
            Some('t') => decoded.push('\t'),
            Some('\\') => decoded.push('\\'),
            Some(other) => {
                decoded.push('\\');
                decoded.push(other);
            }
            None => decoded.push('\\'),
        }
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# machine settings
iso_cut_depth : -0.1
iso_passes: 2
generate_metric : yes
- separator comment
code_header : G17\\nM3 S{spindle_speed:0}
iso_tool_diameters : 0.2, 0.8
";

    #[test]
    fn test_parse_typed_values() {
        let store = ConfigStore::parse(SAMPLE).unwrap();
        assert_eq!(store.len(), 5);
        assert_eq!(store.double("iso_cut_depth").unwrap(), -0.1);
        assert_eq!(store.int("iso_passes").unwrap(), 2);
        assert!(store.bool("generate_metric").unwrap());
        assert_eq!(
            store.string("code_header").unwrap(),
            "G17\nM3 S{spindle_speed:0}"
        );
        assert_eq!(
            store.double_list("iso_tool_diameters").unwrap(),
            vec![0.2, 0.8]
        );
    }

    #[test]
    fn test_missing_and_optional() {
        let store = ConfigStore::parse(SAMPLE).unwrap();
        assert_eq!(
            store.double("drill_depth"),
            Err(ConfigError::MissingKey("drill_depth".to_string()))
        );
        assert_eq!(store.optional_double("drill_depth").unwrap(), None);
    }

    #[test]
    fn test_malformed_value_names_key() {
        let store = ConfigStore::parse("iso_passes : two\n").unwrap();
        match store.int("iso_passes") {
            Err(ConfigError::InvalidValue { key, value, .. }) => {
                assert_eq!(key, "iso_passes");
                assert_eq!(value, "two");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        let store = ConfigStore::parse("iso_mirror : maybe\n").unwrap();
        assert!(store.bool("iso_mirror").is_err());
    }

    #[test]
    fn test_duplicates_and_malformed_reported_together() {
        let err = ConfigStore::parse("a : 1\nnot a pair\na : 2\n : 4\n").unwrap_err();
        let problems = err.problems();
        assert_eq!(problems.len(), 3);
        assert!(problems.contains(&ConfigError::DuplicateKey {
            key: "a".to_string(),
            line: 3
        }));
        assert!(matches!(
            problems[0],
            ConfigError::MalformedLine { line: 2, .. }
        ));
    }

    #[test]
    fn test_decode_escapes() {
        assert_eq!(decode_escapes("a\\tb\\r\\n"), "a\tb\r\n");
        assert_eq!(decode_escapes("c:\\\\tmp"), "c:\\tmp");
        assert_eq!(decode_escapes("keep \\q"), "keep \\q");
        assert_eq!(decode_escapes("trailing \\"), "trailing \\");
    }
}
