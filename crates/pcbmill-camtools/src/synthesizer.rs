//! Geometry synthesis: composite an [`Image`] into one copper [`Region`].
//!
//! Nets are processed strictly in document order. Each primitive is built in
//! image coordinates, moved through the current transform and then either
//! unioned into or subtracted from the accumulated surface, so a later clear
//! primitive can remove copper drawn earlier.

use crate::region::{Region, Ring};
use crate::shapes::{self, CapStyle};
use crate::transform::{self, TransformStack};
use csgrs::sketch::Sketch;
use csgrs::traits::CSG;
use nalgebra::Matrix4;
use pcbmill_core::{
    Aperture, ApertureState, Exposure, Image, Interpolation, Knockout, Level, MacroPrimitive, Net,
    NetState, Orientation, Point,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Line to reflect the finished region across.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MirrorLine {
    /// The vertical line `x = value`.
    Vertical(f64),
    /// The horizontal line `y = value`.
    Horizontal(f64),
}

impl MirrorLine {
    pub fn matrix(self) -> Matrix4<f64> {
        match self {
            MirrorLine::Vertical(x) => transform::mirror_x(x),
            MirrorLine::Horizontal(y) => transform::mirror_y(y),
        }
    }
}

/// What was skipped while compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SynthesisReport {
    pub nets_processed: usize,
    pub flashes: usize,
    pub strokes: usize,
    pub regions: usize,
    pub knockouts: usize,
    /// Apertures or macro primitives that could not be drawn.
    pub unsupported_primitives: usize,
    /// Nets referring to an aperture index with no definition.
    pub missing_apertures: usize,
    /// Region contours with fewer than three distinct points.
    pub dropped_rings: usize,
}

impl SynthesisReport {
    pub fn skipped(&self) -> usize {
        self.unsupported_primitives + self.missing_apertures + self.dropped_rings
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub region: Region,
    pub report: SynthesisReport,
}

/// Union additive shapes into the surface, subtract subtractive ones.
pub fn compose(surface: Sketch<()>, shape: &Sketch<()>, exposure: Exposure) -> Sketch<()> {
    match exposure {
        Exposure::Additive => surface.union(shape),
        Exposure::Subtractive => surface.difference(shape),
    }
}

/// Composite `image` into a region.
///
/// Exterior rings of the result wind in `orientation`, holes the opposite
/// way. When `mirror` is given the finished region is reflected across it.
pub fn synthesize(image: &Image, orientation: Orientation, mirror: Option<MirrorLine>) -> Synthesis {
    let mut compositor = Compositor::new(image);
    compositor.run();
    let Compositor {
        surface, report, ..
    } = compositor;

    let surface = match mirror {
        Some(line) => surface.transform(&line.matrix()),
        None => surface,
    };
    let region = Region::from_sketch(&surface).oriented(orientation);

    if report.skipped() > 0 {
        warn!(
            "Synthesis skipped {} unsupported primitive(s), {} net(s) with missing apertures, {} malformed ring(s)",
            report.unsupported_primitives, report.missing_apertures, report.dropped_rings
        );
    }
    info!(
        "Synthesized {} net(s) into {} polygon(s), area {:.4}",
        report.nets_processed,
        region.polygons.len(),
        region.area()
    );
    Synthesis { region, report }
}

/// Per-call compositing state.
struct Compositor<'a> {
    image: &'a Image,
    surface: Sketch<()>,
    transforms: TransformStack,
    exposure: Exposure,
    knocked_out: HashSet<usize>,
    report: SynthesisReport,
}

impl<'a> Compositor<'a> {
    fn new(image: &'a Image) -> Self {
        Self {
            image,
            surface: Sketch::new(),
            transforms: TransformStack::for_image(&image.info),
            exposure: Exposure::from_polarity(Default::default(), image.info.polarity),
            knocked_out: HashSet::new(),
            report: SynthesisReport::default(),
        }
    }

    fn run(&mut self) {
        let image = self.image;
        let nets = &image.nets;
        let mut level: Option<usize> = None;
        let mut state: Option<usize> = None;
        let mut index = 0;

        while index < nets.len() {
            let net = &nets[index];
            if level != Some(net.level) {
                self.enter_level(net.level);
                level = Some(net.level);
            }
            if state != Some(net.state) {
                self.enter_state(net.state);
                state = Some(net.state);
            }

            match net.interpolation {
                Interpolation::RegionStart => {
                    let next = self.fill_region(index);
                    self.report.nets_processed += next - index;
                    index = next;
                    continue;
                }
                Interpolation::RegionEnd | Interpolation::Deleted => {}
                _ => self.draw_net(net),
            }
            self.report.nets_processed += 1;
            index += 1;
        }
    }

    fn current_level(&self, index: usize) -> Level {
        self.image.level(index).copied().unwrap_or_default()
    }

    fn enter_level(&mut self, index: usize) {
        let level = self.current_level(index);
        self.exposure = Exposure::from_polarity(level.polarity, self.image.info.polarity);
        debug!("Level {}: {:?}, exposure {:?}", index, level.polarity, self.exposure);

        if let Some(knockout) = level.knockout {
            if knockout.first_instance && self.knocked_out.insert(index) {
                self.apply_knockout(&knockout);
            }
        }
    }

    fn apply_knockout(&mut self, knockout: &Knockout) {
        let border = knockout.border;
        let width = knockout.width + 2.0 * border;
        let height = knockout.height + 2.0 * border;
        let center = Point::new(
            knockout.lower_left.x - border + width / 2.0,
            knockout.lower_left.y - border + height / 2.0,
        );
        let exposure = Exposure::from_polarity(knockout.polarity, self.image.info.polarity);
        let shape = shapes::rectangle(center, width, height).transform(&self.transforms.current());
        self.expose(&shape, exposure);
        self.report.knockouts += 1;
    }

    fn enter_state(&mut self, index: usize) {
        let state: NetState = self.image.state(index).copied().unwrap_or_default();
        self.transforms.apply_net_state(&state);
    }

    fn expose(&mut self, shape: &Sketch<()>, exposure: Exposure) {
        let surface = std::mem::replace(&mut self.surface, Sketch::new());
        self.surface = compose(surface, shape, exposure);
    }

    /// Draw every step-and-repeat copy of one net.
    fn draw_net(&mut self, net: &Net) {
        if net.aperture_state == ApertureState::Off {
            return;
        }
        let image = self.image;
        let Some(aperture) = image.aperture(net.aperture) else {
            warn!("Net references undefined aperture D{}", net.aperture);
            self.report.missing_apertures += 1;
            return;
        };

        let repeats = self.current_level(net.level).step_repeat.offsets();
        for (dx, dy) in repeats {
            let start = net.start.offset(dx, dy);
            let stop = net.stop.offset(dx, dy);
            match net.aperture_state {
                ApertureState::Flash => self.flash(aperture, stop),
                ApertureState::On if net.interpolation.is_arc() => match net.circle_segment {
                    Some(segment) => self.stroke_arc(aperture, &segment.offset(dx, dy)),
                    None => {
                        warn!("Arc net without circle segment skipped");
                        self.report.unsupported_primitives += 1;
                    }
                },
                ApertureState::On => self.stroke_line(aperture, start, stop),
                ApertureState::Off => {}
            }
        }
    }

    fn stroke_line(&mut self, aperture: &Aperture, start: Point, stop: Point) {
        let shape = match aperture {
            Aperture::Circle { diameter, .. } => {
                shapes::thick_segment(start, stop, *diameter, CapStyle::Round)
            }
            Aperture::Oval { width, .. } => shapes::thick_segment(start, stop, *width, CapStyle::Round),
            Aperture::Polygon { diameter, .. } => {
                shapes::thick_segment(start, stop, *diameter, CapStyle::Flat)
            }
            Aperture::Rectangle { width, height, .. } => {
                shapes::rectangle_sweep(start, stop, *width, *height)
            }
            Aperture::Macro(_) | Aperture::Unsupported { .. } => {
                warn!("Cannot stroke with {} aperture", aperture.kind_name());
                self.report.unsupported_primitives += 1;
                return;
            }
        };
        self.report.strokes += 1;
        let shape = shape.transform(&self.transforms.current());
        self.expose(&shape, self.exposure);
    }

    fn stroke_arc(&mut self, aperture: &Aperture, segment: &pcbmill_core::CircleSegment) {
        let Some(width) = aperture.primary_dimension() else {
            warn!("Cannot stroke arc with {} aperture", aperture.kind_name());
            self.report.unsupported_primitives += 1;
            return;
        };
        let cap = match aperture {
            Aperture::Rectangle { .. } => CapStyle::Flat,
            _ => CapStyle::Round,
        };
        self.report.strokes += 1;
        let shape = shapes::thick_arc(segment, width, cap).transform(&self.transforms.current());
        self.expose(&shape, self.exposure);
    }

    fn flash(&mut self, aperture: &Aperture, at: Point) {
        let local = self.transforms.current() * transform::translation(at.x, at.y);
        let shape = match aperture {
            Aperture::Circle { diameter, hole } => {
                shapes::with_hole(shapes::circle(Point::ORIGIN, *diameter), hole.as_ref())
            }
            Aperture::Rectangle {
                width,
                height,
                hole,
            } => shapes::with_hole(
                shapes::rectangle(Point::ORIGIN, *width, *height),
                hole.as_ref(),
            ),
            Aperture::Oval {
                width,
                height,
                hole,
            } => shapes::with_hole(shapes::obround(*width, *height), hole.as_ref()),
            Aperture::Polygon {
                diameter,
                sides,
                rotation,
                hole,
            } => {
                if *sides < 3 {
                    warn!("Polygon aperture with {} sides skipped", sides);
                    self.report.unsupported_primitives += 1;
                    return;
                }
                shapes::with_hole(
                    shapes::regular_polygon(Point::ORIGIN, *diameter, *sides, *rotation),
                    hole.as_ref(),
                )
            }
            Aperture::Macro(primitives) => {
                self.flash_macro(primitives, &local);
                self.report.flashes += 1;
                return;
            }
            Aperture::Unsupported { kind } => {
                debug!("Skipping flash of unsupported aperture '{}'", kind);
                self.report.unsupported_primitives += 1;
                return;
            }
        };
        self.report.flashes += 1;
        self.expose(&shape.transform(&local), self.exposure);
    }

    /// Each primitive composites with its own exposure, in definition order.
    fn flash_macro(&mut self, primitives: &[MacroPrimitive], local: &Matrix4<f64>) {
        for primitive in primitives {
            let Some(shape) = shapes::macro_primitive(primitive) else {
                if let MacroPrimitive::Unsupported { code } = primitive {
                    debug!("Skipping unsupported macro primitive {}", code);
                }
                self.report.unsupported_primitives += 1;
                continue;
            };
            let exposure = match primitive {
                MacroPrimitive::Circle { exposure, .. }
                | MacroPrimitive::Outline { exposure, .. }
                | MacroPrimitive::Polygon { exposure, .. }
                | MacroPrimitive::VectorLine { exposure, .. }
                | MacroPrimitive::CenterLine { exposure, .. } => *exposure,
                _ => Exposure::Additive,
            };
            self.expose(&shape.transform(local), exposure);
        }
    }

    /// Consume nets from a region start through its region end.
    ///
    /// Returns the index of the first net after the region.
    fn fill_region(&mut self, start_index: usize) -> usize {
        let image = self.image;
        let nets = &image.nets;
        let region_net = &nets[start_index];
        let mut contours: Vec<Vec<Point>> = Vec::new();
        let mut current: Vec<Point> = Vec::new();
        let mut index = start_index + 1;

        while index < nets.len() {
            let net = &nets[index];
            index += 1;
            match (net.interpolation, net.aperture_state) {
                (Interpolation::RegionEnd, _) => break,
                (Interpolation::Deleted, _) | (Interpolation::RegionStart, _) => {}
                (_, ApertureState::Off) | (_, ApertureState::Flash) => {
                    if !current.is_empty() {
                        contours.push(std::mem::take(&mut current));
                    }
                    current.push(net.stop);
                }
                (interpolation, ApertureState::On) => {
                    if current.is_empty() {
                        current.push(net.start);
                    }
                    match (interpolation.is_arc(), net.circle_segment) {
                        (true, Some(segment)) => {
                            current.extend(shapes::arc_points(&segment).into_iter().skip(1))
                        }
                        _ => current.push(net.stop),
                    }
                }
            }
        }
        if !current.is_empty() {
            contours.push(current);
        }

        let contour_count = contours.len();
        let mut outline: Sketch<()> = Sketch::new();
        let mut rings = 0;
        for contour in contours {
            let ring = Ring::new(contour);
            if ring.is_valid() {
                outline = outline.union(&ring.to_sketch());
                rings += 1;
            } else {
                self.report.dropped_rings += 1;
            }
        }
        if rings == 0 {
            if contour_count == 0 {
                self.report.dropped_rings += 1;
            }
            warn!("Region starting at net {} has no closed contour", start_index);
            return index;
        }

        self.report.regions += 1;
        let repeats = self.current_level(region_net.level).step_repeat.offsets();
        let current_transform = self.transforms.current();
        for (dx, dy) in repeats {
            let placed = outline.transform(&(current_transform * transform::translation(dx, dy)));
            self.expose(&placed, self.exposure);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcbmill_core::{ImagePolarity, Level, MeasurementSystem, Polarity, StepRepeat};

    fn image() -> Image {
        let mut image = Image::new(MeasurementSystem::Metric);
        image.add_aperture(10, Aperture::circle(1.0));
        image
    }

    #[test]
    fn test_compose_is_ordered() {
        let a = shapes::rectangle(Point::ORIGIN, 2.0, 2.0);
        let b = shapes::rectangle(Point::new(1.0, 0.0), 2.0, 2.0);
        let added = compose(Sketch::new(), &a, Exposure::Additive);
        let cut = compose(added.clone(), &b, Exposure::Subtractive);
        assert!((Region::from_sketch(&cut).area() - 2.0).abs() < 1e-9);
        let readded = compose(cut, &b, Exposure::Additive);
        assert!((Region::from_sketch(&readded).area() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_flash() {
        let mut img = image();
        img.push_net(Net::flash(Point::new(2.0, 3.0), 10));
        let result = synthesize(&img, Orientation::Ccw, None);
        assert_eq!(result.region.polygons.len(), 1);
        assert_eq!(result.report.flashes, 1);
        let expected = std::f64::consts::PI * 0.25;
        assert!((result.region.area() - expected).abs() / expected < 0.01);
    }

    #[test]
    fn test_missing_aperture_is_counted() {
        let mut img = image();
        img.push_net(Net::flash(Point::ORIGIN, 99));
        let result = synthesize(&img, Orientation::Ccw, None);
        assert!(result.region.is_empty());
        assert_eq!(result.report.missing_apertures, 1);
    }

    #[test]
    fn test_negative_image_inverts_exposure() {
        let mut img = image();
        img.info.polarity = ImagePolarity::Negative;
        img.push_net(Net::flash(Point::ORIGIN, 10));
        let result = synthesize(&img, Orientation::Ccw, None);
        assert!(result.region.is_empty());
    }

    #[test]
    fn test_step_repeat_copies() {
        let mut img = image();
        let level = img.push_level(Level {
            step_repeat: StepRepeat {
                x: 3,
                y: 2,
                dist_x: 5.0,
                dist_y: 5.0,
            },
            ..Default::default()
        });
        img.push_net(Net::flash(Point::ORIGIN, 10).in_level(level, 0));
        let result = synthesize(&img, Orientation::Ccw, None);
        assert_eq!(result.region.polygons.len(), 6);
    }

    #[test]
    fn test_knockout_composited_before_level_nets() {
        let mut img = image();
        img.push_net(Net::line(Point::new(-5.0, 0.0), Point::new(5.0, 0.0), 10));
        let level = img.push_level(Level {
            polarity: Polarity::Dark,
            knockout: Some(Knockout {
                first_instance: true,
                polarity: Polarity::Clear,
                lower_left: Point::new(-1.0, -2.0),
                width: 2.0,
                height: 4.0,
                border: 0.0,
            }),
            ..Default::default()
        });
        img.push_net(Net::flash(Point::ORIGIN, 10).in_level(level, 0));
        let result = synthesize(&img, Orientation::Ccw, None);
        // trace cut in two by the knockout, the flash drawn afterwards survives
        assert_eq!(result.region.polygons.len(), 3);
        assert_eq!(result.report.knockouts, 1);
    }

    #[test]
    fn test_mirror_reflects_result() {
        let mut img = image();
        img.push_net(Net::flash(Point::new(1.0, 0.0), 10));
        let result = synthesize(&img, Orientation::Ccw, Some(MirrorLine::Vertical(5.0)));
        let (min, max) = result.region.bounding_box().unwrap();
        assert!(((min.x + max.x) / 2.0 - 9.0).abs() < 1e-6);
        for polygon in &result.region.polygons {
            assert_eq!(polygon.exterior.orientation(), Orientation::Ccw);
        }
    }

    #[test]
    fn test_unsupported_macro_primitive_counted() {
        let mut img = image();
        img.add_aperture(
            11,
            Aperture::Macro(vec![
                MacroPrimitive::Circle {
                    exposure: Exposure::Additive,
                    diameter: 2.0,
                    center: Point::ORIGIN,
                    rotation: 0.0,
                },
                MacroPrimitive::Circle {
                    exposure: Exposure::Subtractive,
                    diameter: 1.0,
                    center: Point::ORIGIN,
                    rotation: 0.0,
                },
                MacroPrimitive::Unsupported { code: 42 },
            ]),
        );
        img.push_net(Net::flash(Point::ORIGIN, 11));
        let result = synthesize(&img, Orientation::Ccw, None);
        assert_eq!(result.report.unsupported_primitives, 1);
        assert_eq!(result.region.polygons.len(), 1);
        assert_eq!(result.region.polygons[0].holes.len(), 1);
    }
}
