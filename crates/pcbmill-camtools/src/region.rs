//! Planar regions: closed rings grouped into polygons with holes.
//!
//! Boolean operations are delegated to `csgrs` sketches; parallel offsets to
//! `cavalier_contours`. A [`Region`] is the value handed between the
//! synthesizer, the offsetter and the iso-routing emitter.

use crate::transform;
use cavalier_contours::polyline::{PlineSource, PlineSourceMut, PlineVertex, Polyline};
use csgrs::sketch::Sketch;
use csgrs::traits::CSG;
use nalgebra::Matrix4;
use pcbmill_core::{Orientation, Point};
use serde::{Deserialize, Serialize};
use std::panic;
use tracing::{debug, warn};

/// Points closer than this are treated as one.
pub const POINT_EPSILON: f64 = 1e-7;
/// Maximum angle between linearised points of an arc bulge, in degrees.
const BULGE_STEP_DEGREES: f64 = 5.0;

/// A closed ring. The closing point is implicit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ring {
    points: Vec<Point>,
}

impl Ring {
    /// Build a ring, dropping repeated points and an explicit closing point.
    pub fn new(points: Vec<Point>) -> Self {
        let mut cleaned: Vec<Point> = Vec::with_capacity(points.len());
        for p in points {
            if cleaned
                .last()
                .map_or(true, |last| !last.approx_eq(&p, POINT_EPSILON))
            {
                cleaned.push(p);
            }
        }
        while cleaned.len() > 1
            && cleaned[0].approx_eq(&cleaned[cleaned.len() - 1], POINT_EPSILON)
        {
            cleaned.pop();
        }
        Self { points: cleaned }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// At least three distinct points.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 3
    }

    /// Shoelace area; positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn orientation(&self) -> Orientation {
        if self.signed_area() < 0.0 {
            Orientation::Cw
        } else {
            Orientation::Ccw
        }
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// The ring wound in `orientation`, reversed only when needed.
    pub fn oriented(mut self, orientation: Orientation) -> Self {
        if self.orientation() != orientation {
            self.reverse();
        }
        self
    }

    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| self.points[i].distance(&self.points[(i + 1) % n]))
            .sum()
    }

    pub fn to_sketch(&self) -> Sketch<()> {
        if !self.is_valid() {
            return Sketch::new();
        }
        let pts: Vec<[f64; 2]> = self.points.iter().map(|p| p.to_array()).collect();
        Sketch::polygon(&pts, None)
    }

    fn to_polyline(&self) -> Polyline<f64> {
        let mut pline = Polyline::new();
        for p in &self.points {
            pline.add_vertex(PlineVertex::new(p.x, p.y, 0.0));
        }
        pline.set_is_closed(true);
        pline
    }

    /// Linearise a closed polyline, replacing arc bulges with short chords.
    fn from_polyline(pline: &Polyline<f64>) -> Self {
        let count = pline.vertex_count();
        let mut points = Vec::with_capacity(count * 2);
        for i in 0..count {
            let v1 = pline.at(i);
            let v2 = pline.at((i + 1) % count);
            points.push(Point::new(v1.x, v1.y));
            if v1.bulge.abs() > 1e-9 {
                points.extend(bulge_points(
                    Point::new(v1.x, v1.y),
                    Point::new(v2.x, v2.y),
                    v1.bulge,
                ));
            }
        }
        Ring::new(points)
    }
}

/// Intermediate points of the arc from `p1` to `p2` described by `bulge`.
fn bulge_points(p1: Point, p2: Point, bulge: f64) -> Vec<Point> {
    let chord = p1.distance(&p2);
    if chord < POINT_EPSILON {
        return Vec::new();
    }
    let theta = 4.0 * bulge.atan();
    let radius = (chord / (2.0 * (theta / 2.0).sin())).abs();
    let to_center = radius * (theta.abs() / 2.0).cos();
    let (nx, ny) = (-(p2.y - p1.y) / chord, (p2.x - p1.x) / chord);
    let sign = bulge.signum();
    let center = Point::new(
        (p1.x + p2.x) / 2.0 + nx * to_center * sign,
        (p1.y + p2.y) / 2.0 + ny * to_center * sign,
    );

    let start = (p1.y - center.y).atan2(p1.x - center.x);
    let segments = (theta.abs().to_degrees() / BULGE_STEP_DEGREES).ceil().max(1.0) as usize;
    (1..segments)
        .map(|j| {
            let angle = start + theta * j as f64 / segments as f64;
            Point::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect()
}

/// One connected area: an exterior ring and the holes inside it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionPolygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl RegionPolygon {
    pub fn area(&self) -> f64 {
        self.exterior.area() - self.holes.iter().map(Ring::area).sum::<f64>()
    }

    /// Exterior wound in `orientation`, holes the other way.
    pub fn oriented(self, orientation: Orientation) -> Self {
        Self {
            exterior: self.exterior.oriented(orientation),
            holes: self
                .holes
                .into_iter()
                .map(|hole| hole.oriented(orientation.reversed()))
                .collect(),
        }
    }

    pub fn to_sketch(&self) -> Sketch<()> {
        self.holes
            .iter()
            .filter(|hole| hole.is_valid())
            .fold(self.exterior.to_sketch(), |shape, hole| {
                shape.difference(&hole.to_sketch())
            })
    }

    /// Exterior first, then each hole.
    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        std::iter::once(&self.exterior).chain(self.holes.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Region {
    pub polygons: Vec<RegionPolygon>,
}

impl Region {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn area(&self) -> f64 {
        self.polygons.iter().map(RegionPolygon::area).sum()
    }

    pub fn ring_count(&self) -> usize {
        self.polygons.iter().map(|p| 1 + p.holes.len()).sum()
    }

    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.polygons.iter().flat_map(RegionPolygon::rings)
    }

    /// Read the polygons of a sketch, dropping degenerate rings.
    pub fn from_sketch(sketch: &Sketch<()>) -> Self {
        let mp = sketch.to_multipolygon();
        let mut polygons = Vec::new();
        for poly in mp.0 {
            let exterior = Ring::new(
                poly.exterior()
                    .0
                    .iter()
                    .map(|c| Point::new(c.x, c.y))
                    .collect(),
            );
            if !exterior.is_valid() || exterior.area() < POINT_EPSILON * POINT_EPSILON {
                continue;
            }
            let holes = poly
                .interiors()
                .iter()
                .map(|interior| Ring::new(interior.0.iter().map(|c| Point::new(c.x, c.y)).collect()))
                .filter(Ring::is_valid)
                .collect();
            polygons.push(RegionPolygon { exterior, holes });
        }
        Self { polygons }
    }

    pub fn to_sketch(&self) -> Sketch<()> {
        self.polygons
            .iter()
            .fold(Sketch::new(), |acc, polygon| acc.union(&polygon.to_sketch()))
    }

    pub fn oriented(self, orientation: Orientation) -> Self {
        Self {
            polygons: self
                .polygons
                .into_iter()
                .map(|p| p.oriented(orientation))
                .collect(),
        }
    }

    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Self {
        Self::from_sketch(&self.to_sketch().transform(matrix))
    }

    /// Reflect across a vertical line.
    pub fn mirrored_x(&self, axis: f64) -> Self {
        self.transformed(&transform::mirror_x(axis))
    }

    /// `(min, max)` corners, or `None` for an empty region.
    pub fn bounding_box(&self) -> Option<(Point, Point)> {
        let mut points = self.polygons.iter().flat_map(|p| p.exterior.points());
        let first = *points.next()?;
        Some(points.fold((first, first), |(min, max), p| {
            (
                Point::new(min.x.min(p.x), min.y.min(p.y)),
                Point::new(max.x.max(p.x), max.y.max(p.y)),
            )
        }))
    }

    /// Grow the region by `distance` (shrink when negative).
    ///
    /// Exteriors move outwards and holes inwards; the results are re-unioned
    /// so rings that grew into each other merge.
    pub fn offset(&self, distance: f64) -> Self {
        if distance.abs() < POINT_EPSILON {
            return self.clone();
        }
        let mut merged: Sketch<()> = Sketch::new();
        for polygon in &self.polygons {
            let mut shape: Sketch<()> = offset_ring(&polygon.exterior, distance)
                .iter()
                .fold(Sketch::new(), |acc, ring| acc.union(&ring.to_sketch()));
            for hole in &polygon.holes {
                for shrunk in offset_ring(hole, -distance) {
                    shape = shape.difference(&shrunk.to_sketch());
                }
            }
            merged = merged.union(&shape);
        }
        let result = Self::from_sketch(&merged);
        debug!(
            "Offset {} polygon(s) by {:.4}: {} polygon(s)",
            self.polygons.len(),
            distance,
            result.polygons.len()
        );
        result
    }
}

fn run_offset(pline: &Polyline<f64>, delta: f64) -> Option<Vec<Ring>> {
    match panic::catch_unwind(panic::AssertUnwindSafe(|| pline.parallel_offset(delta))) {
        Ok(offsets) => Some(
            offsets
                .iter()
                .map(Ring::from_polyline)
                .filter(Ring::is_valid)
                .collect(),
        ),
        Err(_) => {
            warn!("Panic during parallel offset of a {}-vertex ring", pline.vertex_count());
            None
        }
    }
}

/// Offset the area enclosed by `ring`: positive grows it, negative shrinks it.
///
/// The sign convention of the offset routine depends on winding, so the
/// result is checked against the original area and retried with the opposite
/// sign if it moved the wrong way.
pub fn offset_ring(ring: &Ring, delta: f64) -> Vec<Ring> {
    if !ring.is_valid() {
        return Vec::new();
    }
    let ccw = ring.clone().oriented(Orientation::Ccw);
    let original = ccw.area();
    let pline = ccw.to_polyline();
    let grows = |rings: &[Ring]| rings.iter().map(Ring::area).sum::<f64>() > original;

    match run_offset(&pline, -delta) {
        Some(rings) if grows(&rings) == (delta > 0.0) => rings,
        _ => run_offset(&pline, delta)
            .filter(|rings| grows(rings) == (delta > 0.0))
            .unwrap_or_default(),
    }
}
