//! Schema-validated machine configuration.
//!
//! Numeric values are expressed in the output unit system selected by
//! `generate_metric` (millimetres or inches, feeds per minute).

use crate::error::{ConfigError, Result, SettingsError};
use crate::store::ConfigStore;
use pcbmill_core::{MeasurementSystem, Orientation};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Every key the configuration schema accepts.
pub const KNOWN_KEYS: &[&str] = &[
    "generate_metric",
    "iso_tool_diameters",
    "iso_passes",
    "iso_pass_overlap",
    "iso_cut_depth",
    "iso_lift",
    "iso_feed_rate",
    "iso_plunge_feed_rate",
    "iso_orientation",
    "iso_mirror",
    "mirror_axis_x",
    "spindle_speed",
    "tool_change_height",
    "drill_depth",
    "drill_lift",
    "drill_feed_rate",
    "drill_pause",
    "drill_slots",
    "drill_overlap",
    "code_absolute",
    "code_relative",
    "code_metric",
    "code_imperial",
    "code_header",
    "code_footer",
    "code_tool_change",
    "code_drill",
];

fn default_true() -> bool {
    true
}
fn default_passes() -> u32 {
    1
}
fn default_overlap() -> f64 {
    0.5
}
fn default_lift() -> f64 {
    1.0
}
fn default_iso_feed_rate() -> f64 {
    200.0
}
fn default_plunge_feed_rate() -> f64 {
    50.0
}
fn default_spindle_speed() -> f64 {
    10000.0
}
fn default_tool_change_height() -> f64 {
    20.0
}
fn default_drill_feed_rate() -> f64 {
    100.0
}
fn default_code_absolute() -> String {
    "G90".to_string()
}
fn default_code_relative() -> String {
    "G91".to_string()
}
fn default_code_metric() -> String {
    "G21".to_string()
}
fn default_code_imperial() -> String {
    "G20".to_string()
}
fn default_code_header() -> String {
    "G17\nG94\nM3 S{spindle_speed:0}\nG4 P2".to_string()
}
fn default_code_footer() -> String {
    "G80\nG0 Z{tool_change_height:0.000}\nM5\nM30".to_string()
}
fn default_code_tool_change() -> String {
    "G80\nM5\nG0 Z{tool_change_height:0.000}\nM6 T{tool:0}\n(MSG, insert tool {tool:0} diameter {diameter:0.000})\nM0\nM3 S{spindle_speed:0}\nG4 P{pause:0.0}\nG0 Z{lift:0.000}".to_string()
}
fn default_code_drill() -> String {
    "G81 X{x:0.0000} Y{y:0.0000} Z{depth:0.0000} R{lift:0.0000} F{feed:0.0}".to_string()
}

/// Machine and toolpath configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineConfig {
    /// Emit millimetres when true, inches otherwise
    #[serde(default = "default_true")]
    pub generate_metric: bool,

    /// Isolation tool diameters, used in order
    pub iso_tool_diameters: Vec<f64>,
    #[serde(default = "default_passes")]
    pub iso_passes: u32,
    /// Fraction of the tool diameter shared by neighbouring passes
    #[serde(default = "default_overlap")]
    pub iso_pass_overlap: f64,
    pub iso_cut_depth: f64,
    #[serde(default = "default_lift")]
    pub iso_lift: f64,
    #[serde(default = "default_iso_feed_rate")]
    pub iso_feed_rate: f64,
    #[serde(default = "default_plunge_feed_rate")]
    pub iso_plunge_feed_rate: f64,
    #[serde(default)]
    pub iso_orientation: Orientation,
    #[serde(default)]
    pub iso_mirror: bool,
    /// Mirror line; the bounding box centre when absent
    #[serde(default)]
    pub mirror_axis_x: Option<f64>,

    #[serde(default = "default_spindle_speed")]
    pub spindle_speed: f64,
    #[serde(default = "default_tool_change_height")]
    pub tool_change_height: f64,

    pub drill_depth: f64,
    #[serde(default = "default_lift")]
    pub drill_lift: f64,
    #[serde(default = "default_drill_feed_rate")]
    pub drill_feed_rate: f64,
    #[serde(default)]
    pub drill_pause: f64,
    /// Drill slots as overlapping hits instead of milling them
    #[serde(default = "default_true")]
    pub drill_slots: bool,
    #[serde(default = "default_overlap")]
    pub drill_overlap: f64,

    #[serde(default = "default_code_absolute")]
    pub code_absolute: String,
    #[serde(default = "default_code_relative")]
    pub code_relative: String,
    #[serde(default = "default_code_metric")]
    pub code_metric: String,
    #[serde(default = "default_code_imperial")]
    pub code_imperial: String,
    #[serde(default = "default_code_header")]
    pub code_header: String,
    #[serde(default = "default_code_footer")]
    pub code_footer: String,
    #[serde(default = "default_code_tool_change")]
    pub code_tool_change: String,
    #[serde(default = "default_code_drill")]
    pub code_drill: String,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            generate_metric: true,
            iso_tool_diameters: vec![0.2],
            iso_passes: default_passes(),
            iso_pass_overlap: default_overlap(),
            iso_cut_depth: -0.1,
            iso_lift: default_lift(),
            iso_feed_rate: default_iso_feed_rate(),
            iso_plunge_feed_rate: default_plunge_feed_rate(),
            iso_orientation: Orientation::default(),
            iso_mirror: false,
            mirror_axis_x: None,
            spindle_speed: default_spindle_speed(),
            tool_change_height: default_tool_change_height(),
            drill_depth: -1.8,
            drill_lift: default_lift(),
            drill_feed_rate: default_drill_feed_rate(),
            drill_pause: 0.0,
            drill_slots: true,
            drill_overlap: default_overlap(),
            code_absolute: default_code_absolute(),
            code_relative: default_code_relative(),
            code_metric: default_code_metric(),
            code_imperial: default_code_imperial(),
            code_header: default_code_header(),
            code_footer: default_code_footer(),
            code_tool_change: default_code_tool_change(),
            code_drill: default_code_drill(),
        }
    }
}

/// Record a problem and fall back so the remaining keys are still checked.
fn collect<T>(
    errors: &mut Vec<ConfigError>,
    result: std::result::Result<T, ConfigError>,
    fallback: T,
) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            errors.push(err);
            fallback
        }
    }
}

impl MachineConfig {
    /// Build a configuration from a parsed `key : value` store.
    ///
    /// Missing required keys, malformed values and unknown keys are all
    /// gathered before failing.
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        let defaults = Self::default();
        let mut errors = Vec::new();

        for (key, line) in store.keys() {
            if !KNOWN_KEYS.contains(&key) {
                errors.push(ConfigError::UnknownKey {
                    key: key.to_string(),
                    line,
                });
            }
        }

        macro_rules! optional {
            ($read:ident, $key:literal, $default:expr) => {{
                let value = store.$read($key).map(|v| v.unwrap_or($default));
                collect(&mut errors, value, $default)
            }};
        }
        macro_rules! required {
            ($read:ident, $key:literal, $fallback:expr) => {
                collect(&mut errors, store.$read($key), $fallback)
            };
        }

        let iso_passes = {
            let value = store.optional_int("iso_passes").and_then(|v| match v {
                None => Ok(defaults.iso_passes),
                Some(n) => u32::try_from(n).map_err(|_| ConfigError::ValueOutOfRange {
                    key: "iso_passes".to_string(),
                    value: n.to_string(),
                    reason: "must be a non-negative integer".to_string(),
                }),
            });
            collect(&mut errors, value, defaults.iso_passes)
        };
        let iso_orientation = {
            let value = store
                .parse_value::<Orientation>("iso_orientation", "cw or ccw")
                .map(|v| v.unwrap_or_default());
            collect(&mut errors, value, Orientation::default())
        };

        let config = Self {
            generate_metric: optional!(optional_bool, "generate_metric", defaults.generate_metric),
            iso_tool_diameters: required!(double_list, "iso_tool_diameters", Vec::new()),
            iso_passes,
            iso_pass_overlap: optional!(optional_double, "iso_pass_overlap", defaults.iso_pass_overlap),
            iso_cut_depth: required!(double, "iso_cut_depth", 0.0),
            iso_lift: optional!(optional_double, "iso_lift", defaults.iso_lift),
            iso_feed_rate: optional!(optional_double, "iso_feed_rate", defaults.iso_feed_rate),
            iso_plunge_feed_rate: optional!(
                optional_double,
                "iso_plunge_feed_rate",
                defaults.iso_plunge_feed_rate
            ),
            iso_orientation,
            iso_mirror: optional!(optional_bool, "iso_mirror", defaults.iso_mirror),
            mirror_axis_x: collect(&mut errors, store.optional_double("mirror_axis_x"), None),
            spindle_speed: optional!(optional_double, "spindle_speed", defaults.spindle_speed),
            tool_change_height: optional!(
                optional_double,
                "tool_change_height",
                defaults.tool_change_height
            ),
            drill_depth: required!(double, "drill_depth", 0.0),
            drill_lift: optional!(optional_double, "drill_lift", defaults.drill_lift),
            drill_feed_rate: optional!(optional_double, "drill_feed_rate", defaults.drill_feed_rate),
            drill_pause: optional!(optional_double, "drill_pause", defaults.drill_pause),
            drill_slots: optional!(optional_bool, "drill_slots", defaults.drill_slots),
            drill_overlap: optional!(optional_double, "drill_overlap", defaults.drill_overlap),
            code_absolute: store.optional_string("code_absolute").unwrap_or(defaults.code_absolute),
            code_relative: store.optional_string("code_relative").unwrap_or(defaults.code_relative),
            code_metric: store.optional_string("code_metric").unwrap_or(defaults.code_metric),
            code_imperial: store.optional_string("code_imperial").unwrap_or(defaults.code_imperial),
            code_header: store.optional_string("code_header").unwrap_or(defaults.code_header),
            code_footer: store.optional_string("code_footer").unwrap_or(defaults.code_footer),
            code_tool_change: store
                .optional_string("code_tool_change")
                .unwrap_or(defaults.code_tool_change),
            code_drill: store.optional_string("code_drill").unwrap_or(defaults.code_drill),
        };

        if !errors.is_empty() {
            return Err(SettingsError::Invalid(errors));
        }
        config.validate()?;
        Ok(config)
    }

    /// Load from `.toml`, `.json`, or the native `key : value` format.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);

        let config = match extension.as_deref() {
            Some("toml") | Some("json") => {
                let content =
                    std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
                        path: path.to_path_buf(),
                        source,
                    })?;
                let config: Self = if extension.as_deref() == Some("toml") {
                    toml::from_str(&content)?
                } else {
                    serde_json::from_str(&content)?
                };
                config.validate()?;
                config
            }
            _ => Self::from_store(&ConfigStore::load(path)?)?,
        };

        debug!(
            "Loaded machine config from {}: {} tool(s), metric={}",
            path.display(),
            config.iso_tool_diameters.len(),
            config.generate_metric
        );
        Ok(config)
    }

    /// Validate configuration, reporting every violation at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, key: &str, value: String, reason: &str| {
            if !ok {
                errors.push(ConfigError::ValueOutOfRange {
                    key: key.to_string(),
                    value,
                    reason: reason.to_string(),
                });
            }
        };

        check(
            !self.iso_tool_diameters.is_empty(),
            "iso_tool_diameters",
            "[]".to_string(),
            "at least one tool diameter is required",
        );
        for diameter in &self.iso_tool_diameters {
            check(
                *diameter > 0.0,
                "iso_tool_diameters",
                diameter.to_string(),
                "diameters must be positive",
            );
        }
        check(
            self.iso_passes >= 1,
            "iso_passes",
            self.iso_passes.to_string(),
            "at least one pass is required",
        );
        for (key, value) in [
            ("iso_pass_overlap", self.iso_pass_overlap),
            ("drill_overlap", self.drill_overlap),
        ] {
            check(
                (0.0..1.0).contains(&value),
                key,
                value.to_string(),
                "must be in [0, 1)",
            );
        }
        for (key, value) in [
            ("iso_feed_rate", self.iso_feed_rate),
            ("iso_plunge_feed_rate", self.iso_plunge_feed_rate),
            ("drill_feed_rate", self.drill_feed_rate),
        ] {
            check(value > 0.0, key, value.to_string(), "must be positive");
        }
        check(
            self.spindle_speed >= 0.0,
            "spindle_speed",
            self.spindle_speed.to_string(),
            "must not be negative",
        );
        check(
            self.drill_pause >= 0.0,
            "drill_pause",
            self.drill_pause.to_string(),
            "must not be negative",
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::Invalid(errors))
        }
    }

    /// Unit system of the generated program.
    pub fn output_system(&self) -> MeasurementSystem {
        MeasurementSystem::from_metric(self.generate_metric)
    }
}
