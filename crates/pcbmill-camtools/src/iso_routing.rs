//! Isolation routing: mill around every ring of an offset copper region.

use crate::error::Result;
use crate::machine::{MachineDriver, Motion};
use crate::program::{FrameValues, ProgramTemplates, ToolChange};
use crate::region::{Region, Ring};
use pcbmill_core::Orientation;
use std::io::Write;
use tracing::debug;

/// Isolation parameters. Lengths and feeds are in input units.
#[derive(Debug, Clone, PartialEq)]
pub struct IsoRoutingParameters {
    pub orientation: Orientation,
    /// The region was mirrored, so the cut direction is reversed to compensate.
    pub mirror: bool,
    pub cut_depth: f64,
    pub lift: f64,
    pub feed_rate: f64,
    pub plunge_feed_rate: f64,
    pub spindle_speed: f64,
    pub tool_change_height: f64,
    /// Dwell after a tool change.
    pub pause: f64,
    pub metric_output: bool,
}

/// One pass of one tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsoPass {
    /// Zero-based tool index.
    pub tool: usize,
    /// Zero-based pass index within the tool.
    pub pass: usize,
    pub tool_diameter: f64,
    /// Distance from the copper edge to the tool centre.
    pub offset: f64,
    /// First pass of the first tool.
    pub first: bool,
    /// Last pass of the last tool.
    pub last: bool,
}

impl IsoPass {
    pub fn starts_tool(&self) -> bool {
        self.pass == 0
    }
}

/// Lay out passes for every tool.
///
/// Pass `p` of a tool with diameter `d` runs at `base + d/2 + p*d*(1-overlap)`,
/// where `base` is the outer edge of the previous tool's last pass.
pub fn plan_passes(tool_diameters: &[f64], passes: u32, overlap: f64) -> Vec<IsoPass> {
    let passes = passes.max(1) as usize;
    let total = tool_diameters.len() * passes;
    let mut plan = Vec::with_capacity(total);
    let mut base = 0.0;

    for (tool, &diameter) in tool_diameters.iter().enumerate() {
        let step = diameter * (1.0 - overlap);
        let mut offset = base;
        for pass in 0..passes {
            offset = base + diameter / 2.0 + pass as f64 * step;
            plan.push(IsoPass {
                tool,
                pass,
                tool_diameter: diameter,
                offset,
                first: plan.is_empty(),
                last: plan.len() + 1 == total,
            });
        }
        base = offset + diameter / 2.0;
    }
    plan
}

/// Counters for one emitted pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IsoPassStats {
    pub rings: usize,
    pub lines: usize,
}

pub struct IsoRoutingEmitter {
    params: IsoRoutingParameters,
    templates: ProgramTemplates,
}

impl IsoRoutingEmitter {
    pub fn new(params: IsoRoutingParameters, templates: ProgramTemplates) -> Self {
        Self { params, templates }
    }

    pub fn params(&self) -> &IsoRoutingParameters {
        &self.params
    }

    /// Winding every ring is cut in.
    pub fn cut_orientation(&self) -> Orientation {
        if self.params.mirror {
            self.params.orientation.reversed()
        } else {
            self.params.orientation
        }
    }

    fn frame(&self) -> FrameValues {
        FrameValues {
            spindle_speed: self.params.spindle_speed,
            lift: self.params.lift,
            tool_change_height: self.params.tool_change_height,
        }
    }

    /// Emit one pass over an already offset region.
    pub fn write<W: Write>(
        &self,
        region: &Region,
        pass: &IsoPass,
        driver: &mut MachineDriver<W>,
    ) -> Result<IsoPassStats> {
        let lines_before = driver.lines_written();
        let p = &self.params;

        if pass.first {
            self.templates
                .write_header(driver, p.metric_output, &self.frame())?;
            driver.rapid_move(Motion::z(p.lift))?;
        } else if pass.starts_tool() {
            self.templates.write_tool_change(
                driver,
                &ToolChange {
                    tool: pass.tool as u32 + 1,
                    diameter: pass.tool_diameter,
                    lift: p.lift,
                    tool_change_height: p.tool_change_height,
                    spindle_speed: p.spindle_speed,
                    pause: p.pause,
                },
            )?;
            driver.rapid_move(Motion::z(p.lift))?;
        }

        let orientation = self.cut_orientation();
        let mut rings = 0;
        for ring in region.rings().filter(|r| r.is_valid()) {
            self.cut_ring(&ring.clone().oriented(orientation), driver)?;
            rings += 1;
        }

        if pass.last {
            self.templates.write_footer(driver, &self.frame())?;
        }

        let stats = IsoPassStats {
            rings,
            lines: driver.lines_written() - lines_before,
        };
        debug!(
            "Tool {} pass {} at offset {:.4}: {} ring(s), {} line(s)",
            pass.tool + 1,
            pass.pass + 1,
            pass.offset,
            stats.rings,
            stats.lines
        );
        Ok(stats)
    }

    fn cut_ring<W: Write>(&self, ring: &Ring, driver: &mut MachineDriver<W>) -> Result<()> {
        let points = ring.points();
        let Some(first) = points.first() else {
            return Ok(());
        };
        let p = &self.params;

        driver.rapid_move(Motion::xy(first.x, first.y))?;
        driver.linear_move(Motion::z(p.cut_depth).with_feed(p.plunge_feed_rate))?;
        driver.linear_move(Motion::feed(p.feed_rate))?;
        for point in &points[1..] {
            driver.linear_move(Motion::xy(point.x, point.y))?;
        }
        driver.linear_move(Motion::xy(first.x, first.y))?;
        driver.rapid_move(Motion::z(p.lift))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineCodes;
    use crate::region::RegionPolygon;
    use pcbmill_core::Point;
    use proptest::prelude::*;

    fn square() -> Region {
        Region {
            polygons: vec![RegionPolygon {
                exterior: Ring::new(vec![
                    Point::new(0.0, 0.0),
                    Point::new(1.0, 0.0),
                    Point::new(1.0, 1.0),
                    Point::new(0.0, 1.0),
                ]),
                holes: Vec::new(),
            }],
        }
    }

    fn params(orientation: Orientation, mirror: bool) -> IsoRoutingParameters {
        IsoRoutingParameters {
            orientation,
            mirror,
            cut_depth: -0.1,
            lift: 1.0,
            feed_rate: 200.0,
            plunge_feed_rate: 50.0,
            spindle_speed: 10000.0,
            tool_change_height: 20.0,
            pause: 0.0,
            metric_output: true,
        }
    }

    fn emit(params: IsoRoutingParameters, plan: &[IsoPass]) -> (String, Vec<IsoPassStats>) {
        let emitter = IsoRoutingEmitter::new(
            params,
            ProgramTemplates::new("M3 S{spindle_speed:0}", "M5", "M6 T{tool}"),
        );
        let mut driver = MachineDriver::new(Vec::new(), MachineCodes::default(), "");
        let stats = plan
            .iter()
            .map(|pass| emitter.write(&square(), pass, &mut driver).unwrap())
            .collect();
        (String::from_utf8(driver.into_inner().unwrap()).unwrap(), stats)
    }

    #[test]
    fn test_single_pass_program() {
        let plan = plan_passes(&[0.2], 1, 0.5);
        let (text, stats) = emit(params(Orientation::Ccw, false), &plan);
        let expected = "G21\nG90\nM3 S10000\nG0 Z1.0000\n\
            G0 X0.0000 Y0.0000\nG1 Z-0.1000 F50.0\nG1 F200.0\n\
            G1 X1.0000 Y0.0000\nG1 X1.0000 Y1.0000\nG1 X0.0000 Y1.0000\n\
            G1 X0.0000 Y0.0000\nG0 Z1.0000\nM5\n";
        assert_eq!(text, expected);
        assert_eq!(stats[0].rings, 1);
        assert_eq!(stats[0].lines, 13);
    }

    #[test]
    fn test_mirror_reverses_cut_direction() {
        let plan = plan_passes(&[0.2], 1, 0.5);
        let (text, _) = emit(params(Orientation::Ccw, true), &plan);
        assert!(text.contains("G0 X0.0000 Y1.0000\n"));
        assert!(text.contains("G1 F200.0\nG1 X1.0000 Y1.0000\nG1 X1.0000 Y0.0000\n"));
    }

    #[test]
    fn test_tool_change_between_tools() {
        let plan = plan_passes(&[0.2, 0.8], 1, 0.5);
        let (text, stats) = emit(params(Orientation::Ccw, false), &plan);
        assert_eq!(text.matches("M3 S10000").count(), 1);
        assert_eq!(text.matches("M6 T2").count(), 1);
        assert!(text.ends_with("G0 Z1.0000\nM5\n"));
        assert_eq!(stats.len(), 2);
    }

    #[test]
    fn test_plan_single_tool() {
        let plan = plan_passes(&[0.2], 3, 0.5);
        assert_eq!(plan.len(), 3);
        let offsets: Vec<f64> = plan.iter().map(|p| p.offset).collect();
        for (got, want) in offsets.iter().zip([0.1, 0.2, 0.3]) {
            assert!((got - want).abs() < 1e-12);
        }
        assert!(plan[0].first && !plan[0].last);
        assert!(plan[2].last && !plan[2].first);
    }

    #[test]
    fn test_plan_second_tool_continues_outwards() {
        let plan = plan_passes(&[0.2, 1.0], 1, 0.0);
        assert_eq!(plan.len(), 2);
        assert!((plan[0].offset - 0.1).abs() < 1e-12);
        // previous groove ends at 0.2, new tool centre half a diameter further
        assert!((plan[1].offset - 0.7).abs() < 1e-12);
        assert!(plan[1].starts_tool());
        assert!(plan[1].last);
    }

    #[test]
    fn test_plan_empty() {
        assert!(plan_passes(&[], 2, 0.5).is_empty());
    }

    proptest! {
        #[test]
        fn prop_orientation_is_idempotent(
            raw in proptest::collection::vec((-50.0f64..50.0, -50.0f64..50.0), 3..12),
        ) {
            let ring = Ring::new(raw.into_iter().map(Point::from).collect());
            prop_assume!(ring.is_valid() && ring.area() > 1e-6);

            let once = ring.clone().oriented(Orientation::Ccw);
            let twice = once.clone().oriented(Orientation::Ccw);
            prop_assert_eq!(&once, &twice);

            let mut flipped = once.clone().oriented(Orientation::Cw).points().to_vec();
            flipped.reverse();
            prop_assert_eq!(flipped.as_slice(), once.points());
        }
    }
}
