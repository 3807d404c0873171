//! # PcbMill Core
//!
//! Core types shared by every PcbMill crate: measurement units, planar
//! geometry primitives and the decoded [`Image`] model that input readers
//! produce and the geometry synthesizer consumes.

pub mod error;
pub mod geometry;
pub mod image;
pub mod units;

pub use error::FormatError;
pub use geometry::{Orientation, Point};
pub use image::{
    Aperture, ApertureHole, ApertureState, CircleSegment, Exposure, Image, ImageInfo,
    ImagePolarity, Interpolation, Knockout, Level, MacroPrimitive, MirrorState, Net, NetState,
    Polarity, StepRepeat,
};
pub use units::{MeasurementSystem, MM_PER_INCH};
