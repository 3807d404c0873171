//! # PcbMill CAM Tools
//!
//! Turns a decoded PCB [`Image`](pcbmill_core::Image) into G-code.
//!
//! ## Pipeline stages
//!
//! - **Input readers** ([`import`]): Gerber RS-274X and Excellon into the image model
//! - **Geometry synthesis** ([`synthesizer`]): composite nets into one copper [`Region`]
//! - **Region helpers** ([`region`], [`shapes`], [`transform`]): rings, tool offsets, aperture shapes
//! - **Emitters** ([`iso_routing`], [`drill`]): toolpaths written through a [`MachineDriver`]
//!
//! ## Supporting Infrastructure
//!
//! - **Templates** ([`template`], [`program`]): named-placeholder code blocks
//! - **Machine driver** ([`machine`]): position, coordinate mode and unit tracking

pub mod drill;
pub mod error;
pub mod import;
pub mod iso_routing;
pub mod machine;
pub mod program;
pub mod region;
pub mod shapes;
pub mod synthesizer;
pub mod template;
pub mod transform;

pub use drill::{slot_points, DrillEmitter, DrillParameters, DrillReport};
pub use error::{CamToolError, Result, TemplateError};
pub use import::{read_file, read_str, InputKind};
pub use iso_routing::{plan_passes, IsoPass, IsoPassStats, IsoRoutingEmitter, IsoRoutingParameters};
pub use machine::{DrillOverrides, DrillSettings, MachineCodes, MachineDriver, MachineState, Motion};
pub use program::{FrameValues, ProgramTemplates, ToolChange};
pub use region::{Region, RegionPolygon, Ring};
pub use synthesizer::{compose, synthesize, MirrorLine, Synthesis, SynthesisReport};
pub use template::{compile, CodeTemplate, TemplateValue};
