//! Decoded photoplot and drill image.
//!
//! An [`Image`] is what the input readers hand to the geometry synthesizer:
//! an ordered list of [`Net`]s, an aperture table keyed by small integers and
//! the [`Level`]s and [`NetState`]s that nets refer back to by index. Nets
//! sharing a level index belong to the same run; a change of index (not of
//! value) marks a level or state boundary.

use crate::geometry::Point;
use crate::units::MeasurementSystem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Polarity of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Polarity {
    #[default]
    Dark,
    Clear,
}

/// Overall polarity of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImagePolarity {
    #[default]
    Positive,
    Negative,
}

/// Whether a primitive adds copper or removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exposure {
    Additive,
    Subtractive,
}

impl Exposure {
    /// Dark polarity exposes, clear polarity removes; a negative image swaps both.
    pub fn from_polarity(polarity: Polarity, image: ImagePolarity) -> Self {
        let dark = polarity == Polarity::Dark;
        let negative = image == ImagePolarity::Negative;
        if dark != negative {
            Exposure::Additive
        } else {
            Exposure::Subtractive
        }
    }

    pub fn is_additive(self) -> bool {
        self == Exposure::Additive
    }
}

/// Hole punched through a standard aperture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ApertureHole {
    Circle { diameter: f64 },
    Rectangle { width: f64, height: f64 },
}

impl ApertureHole {
    /// Build a hole from the optional trailing aperture parameters.
    ///
    /// Both present gives a rectangular hole, only the first a circular one.
    pub fn from_params(first: Option<f64>, second: Option<f64>) -> Option<Self> {
        match (first, second) {
            (Some(width), Some(height)) if width > 0.0 && height > 0.0 => {
                Some(ApertureHole::Rectangle { width, height })
            }
            (Some(diameter), _) if diameter > 0.0 => Some(ApertureHole::Circle { diameter }),
            _ => None,
        }
    }
}

/// One decoded instruction of a parametric aperture macro.
///
/// Coordinates are relative to the flash point; `rotation` is in degrees
/// about the flash point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MacroPrimitive {
    Circle {
        exposure: Exposure,
        diameter: f64,
        center: Point,
        rotation: f64,
    },
    Moire {
        center: Point,
        outer_diameter: f64,
        ring_thickness: f64,
        gap: f64,
        max_rings: u32,
        crosshair_thickness: f64,
        crosshair_length: f64,
        rotation: f64,
    },
    Thermal {
        center: Point,
        outer_diameter: f64,
        inner_diameter: f64,
        gap: f64,
        rotation: f64,
    },
    Outline {
        exposure: Exposure,
        points: Vec<Point>,
        rotation: f64,
    },
    Polygon {
        exposure: Exposure,
        sides: u32,
        center: Point,
        diameter: f64,
        rotation: f64,
    },
    VectorLine {
        exposure: Exposure,
        width: f64,
        start: Point,
        end: Point,
        rotation: f64,
    },
    CenterLine {
        exposure: Exposure,
        width: f64,
        height: f64,
        center: Point,
        rotation: f64,
    },
    /// A primitive code the decoder did not recognise.
    Unsupported { code: u32 },
}

/// Tool or shape definition referenced by index from nets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Aperture {
    Circle {
        diameter: f64,
        hole: Option<ApertureHole>,
    },
    Rectangle {
        width: f64,
        height: f64,
        hole: Option<ApertureHole>,
    },
    Oval {
        width: f64,
        height: f64,
        hole: Option<ApertureHole>,
    },
    Polygon {
        diameter: f64,
        sides: u32,
        /// Degrees.
        rotation: f64,
        hole: Option<ApertureHole>,
    },
    Macro(Vec<MacroPrimitive>),
    /// An aperture the reader could not decode, kept so references resolve.
    Unsupported { kind: String },
}

impl Aperture {
    pub fn circle(diameter: f64) -> Self {
        Aperture::Circle {
            diameter,
            hole: None,
        }
    }

    /// The parameter used as stroke width and drill diameter.
    pub fn primary_dimension(&self) -> Option<f64> {
        match self {
            Aperture::Circle { diameter, .. } | Aperture::Polygon { diameter, .. } => {
                Some(*diameter)
            }
            Aperture::Rectangle { width, .. } | Aperture::Oval { width, .. } => Some(*width),
            Aperture::Macro(_) | Aperture::Unsupported { .. } => None,
        }
    }

    pub fn kind_name(&self) -> &str {
        match self {
            Aperture::Circle { .. } => "circle",
            Aperture::Rectangle { .. } => "rectangle",
            Aperture::Oval { .. } => "oval",
            Aperture::Polygon { .. } => "polygon",
            Aperture::Macro(_) => "macro",
            Aperture::Unsupported { kind } => kind,
        }
    }
}

/// How a net moves from its start to its stop point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    #[default]
    Linear,
    ClockwiseArc,
    CounterClockwiseArc,
    RegionStart,
    RegionEnd,
    Deleted,
}

impl Interpolation {
    pub fn is_arc(self) -> bool {
        matches!(
            self,
            Interpolation::ClockwiseArc | Interpolation::CounterClockwiseArc
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApertureState {
    #[default]
    Off,
    On,
    Flash,
}

/// Geometry of an arc net. Angles are in degrees; a negative sweep is clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleSegment {
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub start_angle: f64,
    pub sweep_angle: f64,
}

impl CircleSegment {
    /// Build the segment for an arc from `start` to `stop` around `center`.
    ///
    /// Coincident end points describe a full circle.
    pub fn from_endpoints(start: Point, stop: Point, center: Point, clockwise: bool) -> Self {
        let radius = center.distance(&start);
        let start_angle = (start.y - center.y).atan2(start.x - center.x).to_degrees();
        let stop_angle = (stop.y - center.y).atan2(stop.x - center.x).to_degrees();
        let mut sweep = stop_angle - start_angle;
        if clockwise {
            if sweep >= -1e-9 {
                sweep -= 360.0;
            }
        } else if sweep <= 1e-9 {
            sweep += 360.0;
        }
        Self {
            center,
            width: radius * 2.0,
            height: radius * 2.0,
            start_angle,
            sweep_angle: sweep,
        }
    }

    pub fn radius(&self) -> f64 {
        self.width / 2.0
    }

    /// Translate the centre by `(dx, dy)`.
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            center: self.center.offset(dx, dy),
            ..self
        }
    }
}

/// Step-and-repeat grid for a level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRepeat {
    pub x: u32,
    pub y: u32,
    pub dist_x: f64,
    pub dist_y: f64,
}

impl Default for StepRepeat {
    fn default() -> Self {
        Self {
            x: 1,
            y: 1,
            dist_x: 0.0,
            dist_y: 0.0,
        }
    }
}

impl StepRepeat {
    /// Number of copies in the grid, saturating on absurd repeat counts.
    pub fn count(&self) -> usize {
        (self.x.max(1) as usize).saturating_mul(self.y.max(1) as usize)
    }

    /// Offsets of every repeat, row by row.
    pub fn offsets(&self) -> Vec<(f64, f64)> {
        let mut offsets = Vec::with_capacity(self.count().min(4096));
        for iy in 0..self.y.max(1) {
            for ix in 0..self.x.max(1) {
                offsets.push((ix as f64 * self.dist_x, iy as f64 * self.dist_y));
            }
        }
        offsets
    }
}

/// Masking rectangle composited once when its level is entered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knockout {
    pub first_instance: bool,
    pub polarity: Polarity,
    pub lower_left: Point,
    pub width: f64,
    pub height: f64,
    pub border: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Level {
    pub polarity: Polarity,
    pub step_repeat: StepRepeat,
    pub knockout: Option<Knockout>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MirrorState {
    #[default]
    None,
    FlipA,
    FlipB,
    FlipAB,
}

/// Transform modifiers for a run of nets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetState {
    pub scale_a: f64,
    pub scale_b: f64,
    pub offset_a: f64,
    pub offset_b: f64,
    pub axis_swap: bool,
    pub mirror: MirrorState,
}

impl Default for NetState {
    fn default() -> Self {
        Self {
            scale_a: 1.0,
            scale_b: 1.0,
            offset_a: 0.0,
            offset_b: 0.0,
            axis_swap: false,
            mirror: MirrorState::None,
        }
    }
}

/// One plot primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Net {
    pub start: Point,
    pub stop: Point,
    pub interpolation: Interpolation,
    pub aperture: u32,
    pub aperture_state: ApertureState,
    pub circle_segment: Option<CircleSegment>,
    /// Index into [`Image::levels`].
    pub level: usize,
    /// Index into [`Image::states`].
    pub state: usize,
}

impl Net {
    pub fn flash(at: Point, aperture: u32) -> Self {
        Self {
            start: at,
            stop: at,
            interpolation: Interpolation::Linear,
            aperture,
            aperture_state: ApertureState::Flash,
            circle_segment: None,
            level: 0,
            state: 0,
        }
    }

    pub fn line(start: Point, stop: Point, aperture: u32) -> Self {
        Self {
            start,
            stop,
            interpolation: Interpolation::Linear,
            aperture,
            aperture_state: ApertureState::On,
            circle_segment: None,
            level: 0,
            state: 0,
        }
    }

    /// Aperture-off move, used inside regions to start a new contour.
    pub fn move_to(start: Point, stop: Point, aperture: u32) -> Self {
        Self {
            aperture_state: ApertureState::Off,
            ..Net::line(start, stop, aperture)
        }
    }

    pub fn arc(start: Point, stop: Point, center: Point, clockwise: bool, aperture: u32) -> Self {
        Self {
            interpolation: if clockwise {
                Interpolation::ClockwiseArc
            } else {
                Interpolation::CounterClockwiseArc
            },
            circle_segment: Some(CircleSegment::from_endpoints(start, stop, center, clockwise)),
            ..Net::line(start, stop, aperture)
        }
    }

    pub fn region_start(at: Point) -> Self {
        Self {
            interpolation: Interpolation::RegionStart,
            aperture_state: ApertureState::Off,
            ..Net::line(at, at, 0)
        }
    }

    pub fn region_end(at: Point) -> Self {
        Self {
            interpolation: Interpolation::RegionEnd,
            aperture_state: ApertureState::Off,
            ..Net::line(at, at, 0)
        }
    }

    /// Attach the net to a level and state.
    pub fn in_level(mut self, level: usize, state: usize) -> Self {
        self.level = level;
        self.state = state;
        self
    }

    /// Flashes and straight aperture-on strokes are what the drill emitter consumes.
    pub fn is_drill_hit(&self) -> bool {
        match self.aperture_state {
            ApertureState::Flash => true,
            ApertureState::On => self.interpolation == Interpolation::Linear,
            ApertureState::Off => false,
        }
    }

    pub fn is_slot(&self) -> bool {
        self.aperture_state == ApertureState::On && self.interpolation == Interpolation::Linear
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.stop)
    }
}

/// Global placement of the image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    pub polarity: ImagePolarity,
    pub offset: Point,
    pub justify_offset: Point,
    /// Degrees.
    pub rotation: f64,
}

/// A decoded Gerber or Excellon file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub unit: MeasurementSystem,
    pub info: ImageInfo,
    pub apertures: BTreeMap<u32, Aperture>,
    pub levels: Vec<Level>,
    pub states: Vec<NetState>,
    pub nets: Vec<Net>,
}

impl Image {
    /// An empty image with one default level and one default net state.
    pub fn new(unit: MeasurementSystem) -> Self {
        Self {
            unit,
            info: ImageInfo::default(),
            apertures: BTreeMap::new(),
            levels: vec![Level::default()],
            states: vec![NetState::default()],
            nets: Vec::new(),
        }
    }

    pub fn add_aperture(&mut self, index: u32, aperture: Aperture) {
        self.apertures.insert(index, aperture);
    }

    /// Append a level and return its index.
    pub fn push_level(&mut self, level: Level) -> usize {
        self.levels.push(level);
        self.levels.len() - 1
    }

    /// Append a net state and return its index.
    pub fn push_state(&mut self, state: NetState) -> usize {
        self.states.push(state);
        self.states.len() - 1
    }

    pub fn push_net(&mut self, net: Net) {
        self.nets.push(net);
    }

    pub fn aperture(&self, index: u32) -> Option<&Aperture> {
        self.apertures.get(&index)
    }

    pub fn level(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }

    pub fn state(&self, index: usize) -> Option<&NetState> {
        self.states.get(index)
    }

    /// Aperture indices referenced by at least one drill hit, ascending.
    pub fn drill_apertures(&self) -> Vec<u32> {
        self.apertures
            .keys()
            .copied()
            .filter(|index| {
                self.nets
                    .iter()
                    .any(|net| net.aperture == *index && net.is_drill_hit())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exposure_from_polarity() {
        use Exposure::*;
        assert_eq!(
            Exposure::from_polarity(Polarity::Dark, ImagePolarity::Positive),
            Additive
        );
        assert_eq!(
            Exposure::from_polarity(Polarity::Clear, ImagePolarity::Positive),
            Subtractive
        );
        assert_eq!(
            Exposure::from_polarity(Polarity::Dark, ImagePolarity::Negative),
            Subtractive
        );
        assert_eq!(
            Exposure::from_polarity(Polarity::Clear, ImagePolarity::Negative),
            Additive
        );
    }

    #[test]
    fn test_hole_from_params() {
        assert_eq!(ApertureHole::from_params(None, None), None);
        assert_eq!(
            ApertureHole::from_params(Some(0.3), None),
            Some(ApertureHole::Circle { diameter: 0.3 })
        );
        assert_eq!(
            ApertureHole::from_params(Some(0.3), Some(0.2)),
            Some(ApertureHole::Rectangle {
                width: 0.3,
                height: 0.2
            })
        );
    }

    #[test]
    fn test_circle_segment_sweep_direction() {
        let center = Point::new(0.0, 0.0);
        let ccw = CircleSegment::from_endpoints(
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            center,
            false,
        );
        assert!((ccw.sweep_angle - 90.0).abs() < 1e-9);
        assert!((ccw.radius() - 1.0).abs() < 1e-12);

        let cw = CircleSegment::from_endpoints(
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            center,
            true,
        );
        assert!((cw.sweep_angle + 270.0).abs() < 1e-9);

        let full = CircleSegment::from_endpoints(
            Point::new(1.0, 0.0),
            Point::new(1.0, 0.0),
            center,
            false,
        );
        assert!((full.sweep_angle - 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_step_repeat_offsets() {
        let sr = StepRepeat {
            x: 2,
            y: 3,
            dist_x: 10.0,
            dist_y: 5.0,
        };
        let offsets = sr.offsets();
        assert_eq!(offsets.len(), 6);
        assert_eq!(offsets[0], (0.0, 0.0));
        assert_eq!(offsets[1], (10.0, 0.0));
        assert_eq!(offsets[5], (10.0, 10.0));
        assert_eq!(StepRepeat::default().offsets(), vec![(0.0, 0.0)]);
    }

    #[test]
    fn test_step_repeat_count_large_grid() {
        let sr = StepRepeat {
            x: u32::MAX,
            y: u32::MAX,
            dist_x: 1.0,
            dist_y: 1.0,
        };
        assert_eq!(
            sr.count(),
            (u32::MAX as usize).saturating_mul(u32::MAX as usize)
        );
        let zero = StepRepeat {
            x: 0,
            y: 0,
            ..StepRepeat::default()
        };
        assert_eq!(zero.count(), 1);
    }

    #[test]
    fn test_drill_apertures_ascending_and_used_only() {
        let mut image = Image::new(MeasurementSystem::Metric);
        image.add_aperture(12, Aperture::circle(1.2));
        image.add_aperture(3, Aperture::circle(0.8));
        image.add_aperture(7, Aperture::circle(0.5));
        image.push_net(Net::flash(Point::new(1.0, 1.0), 12));
        image.push_net(Net::line(Point::new(0.0, 0.0), Point::new(2.0, 0.0), 3));
        image.push_net(Net::move_to(Point::new(0.0, 0.0), Point::new(2.0, 0.0), 7));
        assert_eq!(image.drill_apertures(), vec![3, 12]);
    }

    #[test]
    fn test_aperture_primary_dimension() {
        assert_eq!(Aperture::circle(0.4).primary_dimension(), Some(0.4));
        let oval = Aperture::Oval {
            width: 2.0,
            height: 1.0,
            hole: None,
        };
        assert_eq!(oval.primary_dimension(), Some(2.0));
        assert_eq!(Aperture::Macro(vec![]).primary_dimension(), None);
    }
}
