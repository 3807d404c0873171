//! Gerber RS-274X reader.
//!
//! `gerber_parser` does the tokenising; this module replays its command list
//! into an [`Image`]: apertures, nets, polarity levels and step-and-repeat
//! blocks. Coordinates keep the file's own unit.

use gerber_parser::gerber_types::{
    Aperture as GerberAperture, Command, CoordinateOffset, Coordinates, DCode, ExtendedCode,
    FunctionCode, GCode, InterpolationMode, Operation, Polarity as GerberPolarity, QuadrantMode,
    StepAndRepeat, Unit,
};
use gerber_parser::parse;
use pcbmill_core::{
    Aperture, ApertureHole, FormatError, Image, Level, MeasurementSystem, Net, Point, Polarity,
    StepRepeat,
};
use regex::Regex;
use std::f64::consts::FRAC_PI_2;
use std::io::BufReader;
use tracing::{debug, warn};

/// Drop every repeat of a parameter block after the first.
///
/// Some CAM exports restate `%FS` and `%MO`, which the parser rejects.
fn keep_first(content: &str, pattern: &str) -> Result<String, FormatError> {
    let re = Regex::new(pattern).map_err(|e| FormatError::Unrecognized {
        reason: e.to_string(),
    })?;
    let mut count = 0;
    Ok(re
        .replace_all(content, |caps: &regex::Captures| {
            count += 1;
            if count > 1 {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned())
}

fn convert_aperture(aperture: &GerberAperture) -> Aperture {
    match aperture {
        GerberAperture::Circle(c) => Aperture::Circle {
            diameter: c.diameter,
            hole: ApertureHole::from_params(c.hole_diameter, None),
        },
        GerberAperture::Rectangle(r) => Aperture::Rectangle {
            width: r.x,
            height: r.y,
            hole: ApertureHole::from_params(r.hole_diameter, None),
        },
        GerberAperture::Obround(r) => Aperture::Oval {
            width: r.x,
            height: r.y,
            hole: ApertureHole::from_params(r.hole_diameter, None),
        },
        GerberAperture::Polygon(p) => Aperture::Polygon {
            diameter: p.diameter,
            sides: u32::from(p.vertices),
            rotation: p.rotation.unwrap_or(0.0),
            hole: ApertureHole::from_params(p.hole_diameter, None),
        },
        GerberAperture::Macro(..) => Aperture::Unsupported {
            kind: "macro".to_string(),
        },
        #[allow(unreachable_patterns)]
        _ => Aperture::Unsupported {
            kind: "unknown".to_string(),
        },
    }
}

fn resolve(current: Point, coords: &Option<Coordinates>) -> Point {
    match coords {
        Some(c) => Point::new(
            c.x.map(f64::from).unwrap_or(current.x),
            c.y.map(f64::from).unwrap_or(current.y),
        ),
        None => current,
    }
}

fn center_offset(offset: &Option<CoordinateOffset>) -> (f64, f64) {
    match offset {
        Some(o) => (
            o.x.map(f64::from).unwrap_or(0.0),
            o.y.map(f64::from).unwrap_or(0.0),
        ),
        None => (0.0, 0.0),
    }
}

/// Pick the signs of an unsigned single-quadrant offset.
///
/// The valid centre is equidistant from both endpoints and gives a sweep of
/// at most 90 degrees in the requested direction.
fn single_quadrant_center(start: Point, stop: Point, i: f64, j: f64, clockwise: bool) -> Point {
    let mut best = start.offset(i, j);
    let mut best_error = f64::INFINITY;
    for (si, sj) in [(1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)] {
        let center = start.offset(si * i.abs(), sj * j.abs());
        let a0 = (start.y - center.y).atan2(start.x - center.x);
        let a1 = (stop.y - center.y).atan2(stop.x - center.x);
        let mut sweep = a1 - a0;
        if clockwise {
            while sweep > 0.0 {
                sweep -= 2.0 * std::f64::consts::PI;
            }
        } else {
            while sweep < 0.0 {
                sweep += 2.0 * std::f64::consts::PI;
            }
        }
        if sweep.abs() > FRAC_PI_2 + 1e-6 {
            continue;
        }
        let error = (center.distance(&start) - center.distance(&stop)).abs();
        if error < best_error {
            best_error = error;
            best = center;
        }
    }
    best
}

struct ImageBuilder {
    image: Image,
    position: Point,
    aperture: Option<u32>,
    interpolation: InterpolationMode,
    quadrant: QuadrantMode,
    in_region: bool,
    level: usize,
}

impl ImageBuilder {
    fn new(unit: MeasurementSystem) -> Self {
        Self {
            image: Image::new(unit),
            position: Point::ORIGIN,
            aperture: None,
            interpolation: InterpolationMode::Linear,
            quadrant: QuadrantMode::Multi,
            in_region: false,
            level: 0,
        }
    }

    fn push(&mut self, net: Net) {
        let level = self.level;
        self.image.push_net(net.in_level(level, 0));
    }

    fn current_level(&self) -> Level {
        self.image.level(self.level).copied().unwrap_or_default()
    }

    /// Open a new level unless the current one has no nets yet.
    fn change_level(&mut self, level: Level) {
        let used = self.image.nets.iter().any(|n| n.level == self.level);
        if used {
            self.level = self.image.push_level(level);
        } else if let Some(current) = self.image.levels.get_mut(self.level) {
            *current = level;
        }
    }

    fn set_polarity(&mut self, polarity: Polarity) {
        let level = Level {
            polarity,
            ..self.current_level()
        };
        self.change_level(level);
    }

    fn set_step_repeat(&mut self, step_repeat: StepRepeat) {
        let level = Level {
            step_repeat,
            ..self.current_level()
        };
        self.change_level(level);
    }

    fn interpolate(&mut self, coords: &Option<Coordinates>, offset: &Option<CoordinateOffset>) {
        let stop = resolve(self.position, coords);
        let start = self.position;
        let aperture = self.aperture.unwrap_or(0);

        let net = match self.interpolation {
            InterpolationMode::Linear => Net::line(start, stop, aperture),
            InterpolationMode::ClockwiseCircular | InterpolationMode::CounterclockwiseCircular => {
                let clockwise =
                    matches!(self.interpolation, InterpolationMode::ClockwiseCircular);
                let (i, j) = center_offset(offset);
                let center = if matches!(self.quadrant, QuadrantMode::Single) {
                    single_quadrant_center(start, stop, i, j, clockwise)
                } else {
                    start.offset(i, j)
                };
                Net::arc(start, stop, center, clockwise, aperture)
            }
        };
        if self.aperture.is_none() && !self.in_region {
            warn!("Stroke without a selected aperture at ({}, {})", stop.x, stop.y);
        }
        self.push(net);
        self.position = stop;
    }

    fn move_to(&mut self, coords: &Option<Coordinates>) {
        let stop = resolve(self.position, coords);
        if self.in_region {
            let net = Net::move_to(self.position, stop, self.aperture.unwrap_or(0));
            self.push(net);
        }
        self.position = stop;
    }

    fn flash(&mut self, coords: &Option<Coordinates>) {
        let at = resolve(self.position, coords);
        match self.aperture {
            Some(aperture) => self.push(Net::flash(at, aperture)),
            None => warn!("Flash without a selected aperture at ({}, {})", at.x, at.y),
        }
        self.position = at;
    }

    fn region(&mut self, on: bool) {
        match (on, self.in_region) {
            (true, false) => self.push(Net::region_start(self.position)),
            (false, true) => self.push(Net::region_end(self.position)),
            _ => debug!("Redundant region mode change ignored"),
        }
        self.in_region = on;
    }
}

/// Decode Gerber text into an [`Image`].
pub fn read_gerber(content: &str) -> Result<Image, FormatError> {
    let sanitized = keep_first(content, r"%FS.*?\*%")?;
    let sanitized = keep_first(&sanitized, r"%MO.*?\*%")?;

    let doc = match parse(BufReader::new(sanitized.as_bytes())) {
        Ok(doc) => doc,
        Err((doc, e)) => {
            warn!(
                "Gerber parser returned error, attempting to use partial document. Error: {:?}",
                e
            );
            doc
        }
    };

    let unit = match &doc.units {
        Some(Unit::Millimeters) => MeasurementSystem::Metric,
        Some(Unit::Inches) => MeasurementSystem::Imperial,
        None => {
            warn!("No Units found, assuming Millimeters");
            MeasurementSystem::Metric
        }
    };

    let mut builder = ImageBuilder::new(unit);
    for (code, aperture) in &doc.apertures {
        match u32::try_from(*code) {
            Ok(index) => builder.image.add_aperture(index, convert_aperture(aperture)),
            Err(_) => warn!("Aperture D{} has a negative number, ignored", code),
        }
    }

    for command in doc.commands() {
        match command {
            Command::FunctionCode(FunctionCode::DCode(dcode)) => match dcode {
                DCode::Operation(Operation::Interpolate(coords, offset)) => {
                    builder.interpolate(coords, offset)
                }
                DCode::Operation(Operation::Move(coords)) => builder.move_to(coords),
                DCode::Operation(Operation::Flash(coords)) => builder.flash(coords),
                DCode::SelectAperture(code) => {
                    builder.aperture = u32::try_from(*code).ok();
                    if builder
                        .aperture
                        .map_or(true, |index| builder.image.aperture(index).is_none())
                    {
                        warn!("Selected aperture D{} is not defined", code);
                    }
                }
            },
            Command::FunctionCode(FunctionCode::GCode(gcode)) => match gcode {
                GCode::InterpolationMode(mode) => builder.interpolation = *mode,
                GCode::QuadrantMode(mode) => builder.quadrant = *mode,
                GCode::RegionMode(on) => builder.region(*on),
                _ => {}
            },
            Command::ExtendedCode(ExtendedCode::LoadPolarity(polarity)) => {
                builder.set_polarity(match polarity {
                    GerberPolarity::Dark => Polarity::Dark,
                    GerberPolarity::Clear => Polarity::Clear,
                })
            }
            Command::ExtendedCode(ExtendedCode::StepAndRepeat(sr)) => match sr {
                StepAndRepeat::Open {
                    repeat_x,
                    repeat_y,
                    distance_x,
                    distance_y,
                } => builder.set_step_repeat(StepRepeat {
                    x: (*repeat_x).max(1),
                    y: (*repeat_y).max(1),
                    dist_x: *distance_x,
                    dist_y: *distance_y,
                }),
                StepAndRepeat::Close => builder.set_step_repeat(StepRepeat::default()),
            },
            _ => {}
        }
    }

    if builder.in_region {
        warn!("Region left open at end of file, closing it");
        builder.region(false);
    }

    let image = builder.image;
    if image.nets.is_empty() {
        return Err(FormatError::Empty);
    }
    debug!(
        "Gerber: {} aperture(s), {} net(s), {} level(s)",
        image.apertures.len(),
        image.nets.len(),
        image.levels.len()
    );
    Ok(image)
}
