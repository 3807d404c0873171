//! Excellon drill reader.
//!
//! Handles the subset CAD tools actually emit: an `M48` header with unit,
//! zero-suppression and `TnnC` tool definitions, modal `X`/`Y` hits, `G85`
//! slots and `G90`/`G91` coordinate modes.

use pcbmill_core::{Aperture, FormatError, Image, MeasurementSystem, Net, Point};
use tracing::{debug, warn};

/// Which zeros an integer coordinate keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zeros {
    /// `LZ`: leading zeros kept, digits read from the left.
    Leading,
    /// `TZ`: trailing zeros kept, digits read from the right.
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct NumberFormat {
    zeros: Zeros,
    integer: usize,
    decimal: usize,
}

impl NumberFormat {
    fn for_unit(unit: MeasurementSystem, zeros: Zeros) -> Self {
        match unit {
            MeasurementSystem::Metric => Self {
                zeros,
                integer: 3,
                decimal: 3,
            },
            MeasurementSystem::Imperial => Self {
                zeros,
                integer: 2,
                decimal: 4,
            },
        }
    }

    /// Decode one coordinate; explicit decimal points win over the format.
    fn parse(&self, text: &str) -> Option<f64> {
        if text.contains('.') {
            return text.parse().ok();
        }
        let (negative, digits) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let raw: f64 = match self.zeros {
            Zeros::Trailing => digits.parse().ok()?,
            Zeros::Leading => {
                let width = self.integer + self.decimal;
                let padded = format!("{:0<width$}", digits, width = width);
                padded.parse().ok()?
            }
        };
        let value = raw / 10f64.powi(self.decimal as i32);
        Some(if negative { -value } else { value })
    }
}

/// Split a statement into `(letter, argument)` words.
fn words(line: &str) -> Vec<(char, &str)> {
    let mut words = Vec::new();
    let mut chars = line.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if !c.is_ascii_alphabetic() {
            continue;
        }
        let from = start + c.len_utf8();
        let mut to = from;
        while let Some(&(i, n)) = chars.peek() {
            if n.is_ascii_digit() || matches!(n, '.' | '+' | '-') {
                to = i + n.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        words.push((c.to_ascii_uppercase(), &line[from..to]));
    }
    words
}

struct DrillReader {
    image: Image,
    format: NumberFormat,
    format_explicit: bool,
    in_header: bool,
    tool: Option<u32>,
    position: Point,
    incremental: bool,
}

impl DrillReader {
    fn new() -> Self {
        let unit = MeasurementSystem::Imperial;
        Self {
            image: Image::new(unit),
            format: NumberFormat::for_unit(unit, Zeros::Trailing),
            format_explicit: false,
            in_header: false,
            tool: None,
            position: Point::ORIGIN,
            incremental: false,
        }
    }

    fn set_unit(&mut self, unit: MeasurementSystem) {
        self.image.unit = unit;
        if !self.format_explicit {
            self.format = NumberFormat::for_unit(unit, self.format.zeros);
        }
    }

    /// `METRIC,TZ,000.000` style unit statements.
    fn unit_statement(&mut self, line: &str) {
        let mut parts = line.split(',').map(str::trim);
        match parts.next() {
            Some("METRIC") => self.set_unit(MeasurementSystem::Metric),
            Some("INCH") => self.set_unit(MeasurementSystem::Imperial),
            _ => {}
        }
        for part in parts {
            match part {
                "LZ" => self.format.zeros = Zeros::Leading,
                "TZ" => self.format.zeros = Zeros::Trailing,
                spec if spec.contains('.') && spec.chars().all(|c| c == '0' || c == '.') => {
                    if let Some((int, dec)) = spec.split_once('.') {
                        self.format.integer = int.len();
                        self.format.decimal = dec.len();
                        self.format_explicit = true;
                    }
                }
                _ => {}
            }
        }
    }

    fn number(&self, text: &str, line: usize) -> Result<f64, FormatError> {
        self.format
            .parse(text)
            .ok_or_else(|| FormatError::InvalidStatement {
                line,
                reason: format!("bad number '{}'", text),
            })
    }

    fn tool_number(text: &str, line: usize) -> Result<u32, FormatError> {
        text.parse().map_err(|_| FormatError::InvalidStatement {
            line,
            reason: format!("bad tool number '{}'", text),
        })
    }

    fn define_tool(&mut self, words: &[(char, &str)], line: usize) -> Result<bool, FormatError> {
        let Some(&('T', number)) = words.first() else {
            return Ok(false);
        };
        let Some(&(_, diameter)) = words.iter().find(|(letter, _)| *letter == 'C') else {
            return Ok(false);
        };
        let number = Self::tool_number(number, line)?;
        let diameter: f64 = diameter.parse().map_err(|_| FormatError::InvalidStatement {
            line,
            reason: format!("bad tool diameter '{}'", diameter),
        })?;
        debug!("Tool T{} diameter {}", number, diameter);
        self.image.add_aperture(number, Aperture::circle(diameter));
        Ok(true)
    }

    fn target(&self, words: &[(char, &str)], line: usize) -> Result<Option<Point>, FormatError> {
        let mut x = None;
        let mut y = None;
        for &(letter, arg) in words {
            match letter {
                'X' => x = Some(self.number(arg, line)?),
                'Y' => y = Some(self.number(arg, line)?),
                _ => {}
            }
        }
        if x.is_none() && y.is_none() {
            return Ok(None);
        }
        let point = if self.incremental {
            Point::new(
                self.position.x + x.unwrap_or(0.0),
                self.position.y + y.unwrap_or(0.0),
            )
        } else {
            Point::new(x.unwrap_or(self.position.x), y.unwrap_or(self.position.y))
        };
        Ok(Some(point))
    }

    fn current_tool(&self, line: usize) -> Result<u32, FormatError> {
        self.tool.ok_or_else(|| FormatError::InvalidStatement {
            line,
            reason: "hit before any tool was selected".to_string(),
        })
    }

    fn statement(&mut self, text: &str, line: usize) -> Result<(), FormatError> {
        match text {
            "M48" => {
                self.in_header = true;
                return Ok(());
            }
            "%" | "M95" => {
                self.in_header = false;
                return Ok(());
            }
            "M71" => {
                self.set_unit(MeasurementSystem::Metric);
                return Ok(());
            }
            "M72" => {
                self.set_unit(MeasurementSystem::Imperial);
                return Ok(());
            }
            "G90" => {
                self.incremental = false;
                return Ok(());
            }
            "G91" | "ICI,ON" => {
                self.incremental = true;
                return Ok(());
            }
            _ => {}
        }
        if text.starts_with("METRIC") || text.starts_with("INCH") {
            self.unit_statement(text);
            return Ok(());
        }

        let parsed = words(text);
        if self.define_tool(&parsed, line)? || self.in_header {
            return Ok(());
        }

        if let Some(&('T', number)) = parsed.first() {
            let number = Self::tool_number(number, line)?;
            if number == 0 {
                self.tool = None;
            } else if self.image.aperture(number).is_none() {
                return Err(FormatError::UndefinedTool { tool: number, line });
            } else {
                self.tool = Some(number);
            }
            return Ok(());
        }

        if let Some(slot) = text.find("G85") {
            let start = self.target(&words(&text[..slot]), line)?;
            if let Some(start) = start {
                self.position = start;
            }
            let start = self.position;
            let stop = self
                .target(&words(&text[slot + 3..]), line)?
                .unwrap_or(start);
            let tool = self.current_tool(line)?;
            self.image.push_net(Net::line(start, stop, tool));
            self.position = stop;
            return Ok(());
        }

        if matches!(parsed.first(), Some(('X', _)) | Some(('Y', _))) {
            if let Some(at) = self.target(&parsed, line)? {
                let tool = self.current_tool(line)?;
                self.image.push_net(Net::flash(at, tool));
                self.position = at;
            }
            return Ok(());
        }

        match parsed.first() {
            Some(('M', "30")) | Some(('M', "00")) | Some(('M', "0")) => {}
            Some(('G', "05")) | Some(('G', "5")) | Some(('G', "81")) => {}
            _ => debug!("Ignoring drill statement '{}' at line {}", text, line),
        }
        Ok(())
    }
}

/// Decode Excellon text into an [`Image`] of circular apertures.
///
/// Hits become flashes, `G85` slots become aperture-on strokes.
pub fn read_excellon(content: &str) -> Result<Image, FormatError> {
    let mut reader = DrillReader::new();
    for (index, raw) in content.lines().enumerate() {
        let text = raw.split(';').next().unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }
        reader.statement(&text.to_ascii_uppercase(), index + 1)?;
    }

    let image = reader.image;
    if image.nets.is_empty() {
        if !image.apertures.is_empty() {
            warn!("Drill file defines tools but no hits");
        }
        return Err(FormatError::Empty);
    }
    debug!(
        "Excellon: {} tool(s), {} hit(s)",
        image.apertures.len(),
        image.nets.len()
    );
    Ok(image)
}
