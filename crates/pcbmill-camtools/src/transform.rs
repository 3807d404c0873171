//! Affine transform stack used while compositing an image.
//!
//! Matrices are `Matrix4` so they can be handed straight to
//! [`csgrs::traits::CSG::transform`]. Pushing post-multiplies the current
//! top, so the most recently pushed operation is the first one applied to a
//! point.

use nalgebra::{Matrix4, Point3, Vector3};
use pcbmill_core::{ImageInfo, MirrorState, NetState, Point};

pub fn translation(dx: f64, dy: f64) -> Matrix4<f64> {
    Matrix4::new_translation(&Vector3::new(dx, dy, 0.0))
}

/// Rotation about the origin, in degrees.
pub fn rotation(degrees: f64) -> Matrix4<f64> {
    Matrix4::new_rotation(Vector3::new(0.0, 0.0, degrees.to_radians()))
}

pub fn scaling(sx: f64, sy: f64) -> Matrix4<f64> {
    Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, 1.0))
}

/// Exchange the X and Y axes: a quarter turn after flipping Y.
pub fn axis_swap() -> Matrix4<f64> {
    rotation(90.0) * scaling(1.0, -1.0)
}

/// Reflection across the vertical line `x = axis`.
pub fn mirror_x(axis: f64) -> Matrix4<f64> {
    translation(axis, 0.0) * scaling(-1.0, 1.0) * translation(-axis, 0.0)
}

/// Reflection across the horizontal line `y = axis`.
pub fn mirror_y(axis: f64) -> Matrix4<f64> {
    translation(0.0, axis) * scaling(1.0, -1.0) * translation(0.0, -axis)
}

/// Apply `matrix` to a point in the plane.
pub fn apply(matrix: &Matrix4<f64>, point: Point) -> Point {
    let p = matrix.transform_point(&Point3::new(point.x, point.y, 0.0));
    Point::new(p.x, p.y)
}

/// True when the transform flips orientation.
pub fn is_reflection(matrix: &Matrix4<f64>) -> bool {
    matrix[(0, 0)] * matrix[(1, 1)] - matrix[(0, 1)] * matrix[(1, 0)] < 0.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformStack {
    frames: Vec<Matrix4<f64>>,
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new(Matrix4::identity())
    }
}

impl TransformStack {
    pub fn new(base: Matrix4<f64>) -> Self {
        Self { frames: vec![base] }
    }

    /// Base frame for an image: justification, then offset, then rotation.
    pub fn for_image(info: &ImageInfo) -> Self {
        let base = translation(info.justify_offset.x, info.justify_offset.y)
            * translation(info.offset.x, info.offset.y)
            * rotation(info.rotation);
        Self::new(base)
    }

    pub fn current(&self) -> Matrix4<f64> {
        self.frames.last().copied().unwrap_or_else(Matrix4::identity)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, op: Matrix4<f64>) {
        let top = self.current();
        self.frames.push(top * op);
    }

    /// Pop the top frame; the base frame is never removed.
    pub fn pop(&mut self) -> Option<Matrix4<f64>> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Drop everything above the base frame.
    pub fn reset(&mut self) {
        self.frames.truncate(1);
    }

    /// Rebuild from the base for a new net state: scale, translate, axis swap, mirror.
    pub fn apply_net_state(&mut self, state: &NetState) {
        self.reset();
        self.push(scaling(state.scale_a, state.scale_b));
        self.push(translation(state.offset_a, state.offset_b));
        if state.axis_swap {
            self.push(axis_swap());
        }
        let (mx, my) = match state.mirror {
            MirrorState::None => (1.0, 1.0),
            MirrorState::FlipA => (-1.0, 1.0),
            MirrorState::FlipB => (1.0, -1.0),
            MirrorState::FlipAB => (-1.0, -1.0),
        };
        if mx < 0.0 || my < 0.0 {
            self.push(scaling(mx, my));
        }
    }

    pub fn apply(&self, point: Point) -> Point {
        apply(&self.current(), point)
    }
}
