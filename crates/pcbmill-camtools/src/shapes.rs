//! Closed shapes for flashes, strokes and macro primitives.
//!
//! Every builder returns a `Sketch` in image coordinates (or in the local
//! frame of a flash, centred on the origin); the caller applies the current
//! transform before compositing.

use crate::transform::{rotation, translation};
use csgrs::sketch::Sketch;
use csgrs::traits::CSG;
use pcbmill_core::{ApertureHole, CircleSegment, MacroPrimitive, Point};

/// Segments used for full circles.
pub const CIRCLE_SEGMENTS: usize = 64;
/// Angular step when tessellating arcs, in degrees.
pub const ARC_STEP_DEGREES: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStyle {
    Round,
    Flat,
}

fn polygon(points: &[Point]) -> Sketch<()> {
    if points.len() < 3 {
        return Sketch::new();
    }
    let pts: Vec<[f64; 2]> = points.iter().map(|p| p.to_array()).collect();
    Sketch::polygon(&pts, None)
}

pub fn circle(center: Point, diameter: f64) -> Sketch<()> {
    if diameter <= 0.0 {
        return Sketch::new();
    }
    let c: Sketch<()> = Sketch::circle(diameter / 2.0, CIRCLE_SEGMENTS, None);
    c.transform(&translation(center.x, center.y))
}

pub fn rectangle(center: Point, width: f64, height: f64) -> Sketch<()> {
    if width <= 0.0 || height <= 0.0 {
        return Sketch::new();
    }
    let (hw, hh) = (width / 2.0, height / 2.0);
    polygon(&[
        Point::new(center.x - hw, center.y - hh),
        Point::new(center.x + hw, center.y - hh),
        Point::new(center.x + hw, center.y + hh),
        Point::new(center.x - hw, center.y + hh),
    ])
}

/// A stadium fitting in `width` x `height`, centred on the origin.
pub fn obround(width: f64, height: f64) -> Sketch<()> {
    if width <= 0.0 || height <= 0.0 {
        return Sketch::new();
    }
    let d = width.min(height);
    let (dx, dy) = ((width - d) / 2.0, (height - d) / 2.0);
    thick_segment(Point::new(-dx, -dy), Point::new(dx, dy), d, CapStyle::Round)
}

/// Vertices of a regular polygon; the first sits at `rotation` degrees.
pub fn regular_polygon_points(center: Point, diameter: f64, sides: u32, rotation: f64) -> Vec<Point> {
    let radius = diameter / 2.0;
    (0..sides)
        .map(|i| {
            let angle = rotation.to_radians() + std::f64::consts::TAU * i as f64 / sides as f64;
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

pub fn regular_polygon(center: Point, diameter: f64, sides: u32, rotation: f64) -> Sketch<()> {
    if sides < 3 || diameter <= 0.0 {
        return Sketch::new();
    }
    polygon(&regular_polygon_points(center, diameter, sides, rotation))
}

/// A straight stroke of `width` from `a` to `b`.
pub fn thick_segment(a: Point, b: Point, width: f64, cap: CapStyle) -> Sketch<()> {
    if width <= 0.0 {
        return Sketch::new();
    }
    let len = a.distance(&b);
    if len < 1e-9 {
        return match cap {
            CapStyle::Round => circle(a, width),
            CapStyle::Flat => rectangle(a, width, width),
        };
    }

    let angle = (b.y - a.y).atan2(b.x - a.x).to_degrees();
    let body = rectangle(Point::ORIGIN, len, width)
        .transform(&(translation((a.x + b.x) / 2.0, (a.y + b.y) / 2.0) * rotation(angle)));

    match cap {
        CapStyle::Flat => body,
        CapStyle::Round => body.union(&circle(a, width)).union(&circle(b, width)),
    }
}

/// Sweep of a `width` x `height` rectangle from `a` to `b`.
///
/// The hull of both end rectangles; a hexagon for diagonal moves.
pub fn rectangle_sweep(a: Point, b: Point, width: f64, height: f64) -> Sketch<()> {
    if width <= 0.0 || height <= 0.0 {
        return Sketch::new();
    }
    let (hw, hh) = (width / 2.0, height / 2.0);
    let corners: Vec<Point> = [a, b]
        .iter()
        .flat_map(|c| {
            [
                Point::new(c.x - hw, c.y - hh),
                Point::new(c.x + hw, c.y - hh),
                Point::new(c.x + hw, c.y + hh),
                Point::new(c.x - hw, c.y + hh),
            ]
        })
        .collect();
    polygon(&convex_hull(corners))
}

/// Counter-clockwise convex hull (monotone chain).
pub fn convex_hull(mut points: Vec<Point>) -> Vec<Point> {
    points.sort_by(|p, q| p.x.total_cmp(&q.x).then(p.y.total_cmp(&q.y)));
    points.dedup_by(|p, q| p.approx_eq(q, 1e-12));
    if points.len() < 3 {
        return points;
    }
    let cross = |o: Point, a: Point, b: Point| (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x);
    let half = |iter: &mut dyn Iterator<Item = Point>| {
        let mut chain: Vec<Point> = Vec::new();
        for p in iter {
            while chain.len() >= 2 && cross(chain[chain.len() - 2], chain[chain.len() - 1], p) <= 0.0 {
                chain.pop();
            }
            chain.push(p);
        }
        chain.pop();
        chain
    };

    let mut hull = half(&mut points.iter().copied());
    hull.extend(half(&mut points.iter().rev().copied()));
    hull
}

/// Points along an arc, start and end included.
pub fn arc_points(segment: &CircleSegment) -> Vec<Point> {
    let radius = segment.radius();
    let steps = (segment.sweep_angle.abs() / ARC_STEP_DEGREES).ceil().max(2.0) as usize;
    (0..=steps)
        .map(|i| {
            let angle = (segment.start_angle + segment.sweep_angle * i as f64 / steps as f64).to_radians();
            Point::new(
                segment.center.x + radius * angle.cos(),
                segment.center.y + radius * angle.sin(),
            )
        })
        .collect()
}

/// An arc stroked with `width`.
pub fn thick_arc(segment: &CircleSegment, width: f64, cap: CapStyle) -> Sketch<()> {
    if width <= 0.0 {
        return Sketch::new();
    }
    let radius = segment.radius();
    let outer_r = radius + width / 2.0;
    let inner_r = (radius - width / 2.0).max(0.0);
    let mid = arc_points(segment);
    let on_radius = |p: &Point, r: f64| {
        let (dx, dy) = (p.x - segment.center.x, p.y - segment.center.y);
        let scale = if radius > 0.0 { r / radius } else { 0.0 };
        Point::new(segment.center.x + dx * scale, segment.center.y + dy * scale)
    };

    let mut band: Vec<Point> = mid.iter().map(|p| on_radius(p, outer_r)).collect();
    band.extend(mid.iter().rev().map(|p| on_radius(p, inner_r)));

    let body = if segment.sweep_angle.abs() >= 360.0 - 1e-9 {
        circle(segment.center, outer_r * 2.0).difference(&circle(segment.center, inner_r * 2.0))
    } else {
        polygon(&band)
    };

    match (cap, mid.first(), mid.last()) {
        (CapStyle::Round, Some(first), Some(last)) => {
            body.union(&circle(*first, width)).union(&circle(*last, width))
        }
        _ => body,
    }
}

pub fn hole(hole: &ApertureHole) -> Sketch<()> {
    match *hole {
        ApertureHole::Circle { diameter } => circle(Point::ORIGIN, diameter),
        ApertureHole::Rectangle { width, height } => rectangle(Point::ORIGIN, width, height),
    }
}

/// Punch the optional hole out of a flash shape.
pub fn with_hole(shape: Sketch<()>, punched: Option<&ApertureHole>) -> Sketch<()> {
    match punched {
        Some(h) => shape.difference(&hole(h)),
        None => shape,
    }
}

fn annulus(center: Point, outer: f64, inner: f64) -> Sketch<()> {
    let ring = circle(center, outer);
    if inner > 0.0 {
        ring.difference(&circle(center, inner))
    } else {
        ring
    }
}

/// Shape of one macro primitive in the flash's local frame.
///
/// `None` for primitive kinds that cannot be drawn.
pub fn macro_primitive(primitive: &MacroPrimitive) -> Option<Sketch<()>> {
    let (shape, angle) = match primitive {
        MacroPrimitive::Circle {
            diameter,
            center,
            rotation,
            ..
        } => (circle(*center, *diameter), *rotation),
        MacroPrimitive::Moire {
            center,
            outer_diameter,
            ring_thickness,
            gap,
            max_rings,
            crosshair_thickness,
            crosshair_length,
            rotation,
        } => {
            let mut shape: Sketch<()> = Sketch::new();
            for ring in 0..*max_rings {
                let outer = outer_diameter - 2.0 * ring as f64 * (ring_thickness + gap);
                if outer <= 0.0 {
                    break;
                }
                shape = shape.union(&annulus(*center, outer, outer - 2.0 * ring_thickness));
            }
            shape = shape
                .union(&rectangle(*center, *crosshair_length, *crosshair_thickness))
                .union(&rectangle(*center, *crosshair_thickness, *crosshair_length));
            (shape, *rotation)
        }
        MacroPrimitive::Thermal {
            center,
            outer_diameter,
            inner_diameter,
            gap,
            rotation,
        } => {
            let shape = annulus(*center, *outer_diameter, *inner_diameter)
                .difference(&rectangle(*center, outer_diameter * 1.1, *gap))
                .difference(&rectangle(*center, *gap, outer_diameter * 1.1));
            (shape, *rotation)
        }
        MacroPrimitive::Outline {
            points, rotation, ..
        } => (polygon(points), *rotation),
        MacroPrimitive::Polygon {
            sides,
            center,
            diameter,
            rotation,
            ..
        } => (regular_polygon(*center, *diameter, *sides, 0.0), *rotation),
        MacroPrimitive::VectorLine {
            width,
            start,
            end,
            rotation,
            ..
        } => (thick_segment(*start, *end, *width, CapStyle::Flat), *rotation),
        MacroPrimitive::CenterLine {
            width,
            height,
            center,
            rotation,
            ..
        } => (rectangle(*center, *width, *height), *rotation),
        MacroPrimitive::Unsupported { .. } => return None,
    };
    if angle.abs() > f64::EPSILON {
        Some(shape.transform(&rotation(angle)))
    } else {
        Some(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use std::f64::consts::PI;

    fn area(sketch: &Sketch<()>) -> f64 {
        Region::from_sketch(sketch).area()
    }

    #[test]
    fn test_circle_area_and_radius() {
        let center = Point::new(3.0, -2.0);
        let shape = circle(center, 1.0);
        assert!((area(&shape) - PI * 0.25).abs() / (PI * 0.25) < 0.01);
        for ring in Region::from_sketch(&shape).rings() {
            for p in ring.points() {
                assert!(p.distance(&center) <= 0.5 + 1e-9);
            }
        }
    }

    #[test]
    fn test_stadium_area() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        let w: f64 = 0.5;
        let expected = w * 10.0 + PI * (w / 2.0).powi(2);
        let got = area(&thick_segment(a, b, w, CapStyle::Round));
        assert!((got - expected).abs() / expected < 0.01);

        let flat = area(&thick_segment(a, b, w, CapStyle::Flat));
        assert!((flat - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_obround_orientation() {
        let region = Region::from_sketch(&obround(3.0, 1.0));
        let (min, max) = region.bounding_box().unwrap();
        assert!((max.x - min.x - 3.0).abs() < 1e-6);
        assert!((max.y - min.y - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_rectangle_sweep_diagonal_is_hexagon() {
        let hull = convex_hull(vec![
            Point::new(-0.5, -0.5),
            Point::new(0.5, -0.5),
            Point::new(0.5, 0.5),
            Point::new(-0.5, 0.5),
            Point::new(1.5, 1.5),
            Point::new(2.5, 1.5),
            Point::new(2.5, 2.5),
            Point::new(1.5, 2.5),
        ]);
        assert_eq!(hull.len(), 6);
        let swept = area(&rectangle_sweep(Point::new(0.0, 0.0), Point::new(2.0, 2.0), 1.0, 1.0));
        // two unit squares plus the band between them
        assert!((swept - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_arc_points_cover_sweep() {
        let seg = CircleSegment {
            center: Point::ORIGIN,
            width: 2.0,
            height: 2.0,
            start_angle: 0.0,
            sweep_angle: -90.0,
        };
        let pts = arc_points(&seg);
        assert_eq!(pts.len(), 19);
        assert!(pts[0].approx_eq(&Point::new(1.0, 0.0), 1e-12));
        assert!(pts[18].approx_eq(&Point::new(0.0, -1.0), 1e-12));
    }

    #[test]
    fn test_flash_with_hole() {
        let shape = with_hole(
            circle(Point::ORIGIN, 2.0),
            Some(&ApertureHole::Rectangle {
                width: 0.5,
                height: 0.5,
            }),
        );
        let expected = PI - 0.25;
        assert!((area(&shape) - expected).abs() < 0.01);
    }

    #[test]
    fn test_macro_rotation_about_origin() {
        let prim = MacroPrimitive::CenterLine {
            exposure: pcbmill_core::Exposure::Additive,
            width: 2.0,
            height: 1.0,
            center: Point::new(3.0, 0.0),
            rotation: 90.0,
        };
        let region = Region::from_sketch(&macro_primitive(&prim).unwrap());
        let (min, max) = region.bounding_box().unwrap();
        assert!(min.approx_eq(&Point::new(-0.5, 2.0), 1e-9));
        assert!(max.approx_eq(&Point::new(0.5, 4.0), 1e-9));
        assert!(macro_primitive(&MacroPrimitive::Unsupported { code: 9 }).is_none());
    }

    #[test]
    fn test_thermal_has_four_spokes_removed() {
        let prim = MacroPrimitive::Thermal {
            center: Point::ORIGIN,
            outer_diameter: 2.0,
            inner_diameter: 1.0,
            gap: 0.2,
            rotation: 0.0,
        };
        let region = Region::from_sketch(&macro_primitive(&prim).unwrap());
        assert_eq!(region.polygons.len(), 4);
    }
}
