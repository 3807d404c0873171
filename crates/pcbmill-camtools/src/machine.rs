//! Stateful G-code writer.
//!
//! [`MachineDriver`] tracks the tool position, coordinate mode and unit
//! system of one output stream. Every motion call emits at most one line and
//! leaves the state holding the resolved absolute position.

use crate::error::Result;
use crate::template::{format_number, CodeTemplate, TemplateValue};
use pcbmill_core::MM_PER_INCH;
use std::io::Write;
use tracing::trace;

/// Decimal places written for coordinates.
pub const COORDINATE_DECIMALS: usize = 4;
/// Decimal places written for feed rates.
pub const FEED_DECIMALS: usize = 1;

/// Placeholder names of the drill template, in render order.
pub const DRILL_FIELDS: [&str; 6] = ["x", "y", "depth", "lift", "feed", "pause"];

/// Mode-setting codes of the target controller.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineCodes {
    pub absolute: String,
    pub relative: String,
    pub metric: String,
    pub imperial: String,
}

impl Default for MachineCodes {
    fn default() -> Self {
        Self {
            absolute: "G90".to_string(),
            relative: "G91".to_string(),
            metric: "G21".to_string(),
            imperial: "G20".to_string(),
        }
    }
}

/// Standing values used by [`MachineDriver::drill_move`] when no override is given.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrillSettings {
    pub depth: f64,
    pub lift: f64,
    pub feed_rate: f64,
    pub pause: f64,
}

/// Per-call overrides for a drill hit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrillOverrides {
    pub depth: Option<f64>,
    pub lift: Option<f64>,
    pub feed_rate: Option<f64>,
    pub pause: Option<f64>,
}

/// Position and modes, in output units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub relative: bool,
    pub metric: bool,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            relative: false,
            metric: true,
        }
    }
}

/// Target of a move; absent axes are left out of the emitted line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Motion {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub feed: Option<f64>,
}

impl Motion {
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn z(z: f64) -> Self {
        Self {
            z: Some(z),
            ..Self::default()
        }
    }

    pub fn feed(feed: f64) -> Self {
        Self {
            feed: Some(feed),
            ..Self::default()
        }
    }

    pub fn with_feed(mut self, feed: f64) -> Self {
        self.feed = Some(feed);
        self
    }
}

pub struct MachineDriver<W: Write> {
    out: W,
    codes: MachineCodes,
    drill_template: CodeTemplate,
    drill: DrillSettings,
    state: MachineState,
    input_scale: f64,
    output_scale: f64,
    lines_written: usize,
}

impl<W: Write> MachineDriver<W> {
    /// A driver in absolute, metric mode with metric input.
    ///
    /// `drill_template` is compiled against [`DRILL_FIELDS`].
    pub fn new(out: W, codes: MachineCodes, drill_template: &str) -> Self {
        Self {
            out,
            codes,
            drill_template: CodeTemplate::new(drill_template, &DRILL_FIELDS),
            drill: DrillSettings::default(),
            state: MachineState::default(),
            input_scale: 1.0,
            output_scale: 1.0,
            lines_written: 0,
        }
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    /// Factor applied to every incoming length.
    pub fn scale(&self) -> f64 {
        self.input_scale * self.output_scale
    }

    /// Declare the unit of incoming values. Emits nothing.
    pub fn set_input_unit(&mut self, metric: bool) {
        self.input_scale = if metric { 1.0 } else { MM_PER_INCH };
    }

    pub fn set_drill_settings(&mut self, drill: DrillSettings) {
        self.drill = drill;
    }

    pub fn drill_settings(&self) -> DrillSettings {
        self.drill
    }

    /// Feed-rate move (`G1`).
    pub fn linear_move(&mut self, motion: Motion) -> Result<()> {
        self.emit_motion("G1", motion)
    }

    /// Rapid move (`G0`).
    pub fn rapid_move(&mut self, motion: Motion) -> Result<()> {
        self.emit_motion("G0", motion)
    }

    fn emit_motion(&mut self, code: &str, motion: Motion) -> Result<()> {
        let scale = self.scale();
        let relative = self.state.relative;
        let mut line = String::from(code);
        let mut words = 0;

        let axes = [
            ('X', motion.x, &mut self.state.x),
            ('Y', motion.y, &mut self.state.y),
            ('Z', motion.z, &mut self.state.z),
        ];
        for (letter, target, current) in axes {
            let Some(value) = target else { continue };
            let absolute = value * scale;
            let emitted = if relative {
                absolute - *current
            } else {
                absolute
            };
            *current = absolute;
            line.push(' ');
            line.push(letter);
            line.push_str(&format_number(emitted, COORDINATE_DECIMALS));
            words += 1;
        }
        if let Some(feed) = motion.feed {
            line.push_str(" F");
            line.push_str(&format_number(feed * scale, FEED_DECIMALS));
            words += 1;
        }

        if words == 0 {
            return Ok(());
        }
        self.write_line(&line)
    }

    /// One drill hit rendered through the drill template.
    ///
    /// Overrides replace the standing drill settings for this hit and become
    /// the new standing values.
    pub fn drill_move(&mut self, x: f64, y: f64, overrides: DrillOverrides) -> Result<()> {
        if let Some(depth) = overrides.depth {
            self.drill.depth = depth;
        }
        if let Some(lift) = overrides.lift {
            self.drill.lift = lift;
        }
        if let Some(feed_rate) = overrides.feed_rate {
            self.drill.feed_rate = feed_rate;
        }
        if let Some(pause) = overrides.pause {
            self.drill.pause = pause;
        }

        let scale = self.scale();
        let (x, y) = (x * scale, y * scale);
        let values = [
            TemplateValue::Number(x),
            TemplateValue::Number(y),
            TemplateValue::Number(self.drill.depth * scale),
            TemplateValue::Number(self.drill.lift * scale),
            TemplateValue::Number(self.drill.feed_rate * scale),
            TemplateValue::Number(self.drill.pause * scale),
        ];
        let line = self.drill_template.render(&values)?;
        self.state.x = x;
        self.state.y = y;
        self.state.z = self.drill.lift * scale;
        self.insert_code(&line)
    }

    /// Switch coordinate mode and emit the matching code.
    pub fn relative_mode(&mut self, on: bool) -> Result<()> {
        self.state.relative = on;
        let code = if on {
            self.codes.relative.clone()
        } else {
            self.codes.absolute.clone()
        };
        self.insert_code(&code)
    }

    /// Switch output units and emit the matching code.
    pub fn metric_mode(&mut self, on: bool) -> Result<()> {
        self.state.metric = on;
        self.output_scale = if on { 1.0 } else { 1.0 / MM_PER_INCH };
        let code = if on {
            self.codes.metric.clone()
        } else {
            self.codes.imperial.clone()
        };
        self.insert_code(&code)
    }

    /// Write each non-empty line of `text` verbatim.
    pub fn insert_code(&mut self, text: &str) -> Result<()> {
        for line in text.lines().map(str::trim_end).filter(|l| !l.trim().is_empty()) {
            self.write_line(line)?;
        }
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        trace!("gcode: {}", line);
        writeln!(self.out, "{}", line)?;
        self.lines_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
