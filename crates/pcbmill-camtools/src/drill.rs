//! Drill emission: per-tool sequencing of hits and slots.

use crate::error::Result;
use crate::machine::{DrillOverrides, DrillSettings, MachineDriver, Motion};
use crate::program::{FrameValues, ProgramTemplates, ToolChange};
use pcbmill_core::{ApertureState, Image, Point};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, warn};

/// Drill parameters. Lengths and feeds are in input units.
#[derive(Debug, Clone, PartialEq)]
pub struct DrillParameters {
    pub depth: f64,
    pub lift: f64,
    pub feed_rate: f64,
    pub pause: f64,
    /// Subdivide slots into overlapping hits instead of milling them.
    pub slots: bool,
    /// Overlap of neighbouring slot hits, in `[0, 1)`.
    pub overlap: f64,
    pub spindle_speed: f64,
    pub tool_change_height: f64,
    pub metric_output: bool,
    /// Reflect every coordinate across the vertical line `x = axis`.
    pub mirror_axis: Option<f64>,
}

/// Points drilled along a slot from `start` to `stop`.
///
/// Hits are `(1 - overlap) * diameter` apart at most, spread evenly so that
/// the first and last hit land exactly on the endpoints.
pub fn slot_points(start: Point, stop: Point, diameter: f64, overlap: f64) -> Vec<Point> {
    let length = start.distance(&stop);
    let step = (1.0 - overlap) * diameter;
    if !(step > 0.0) || length <= 0.0 {
        return vec![start];
    }

    let count = (length / step - 1e-9).ceil().max(0.0) as usize;
    if count == 0 {
        return vec![start];
    }
    (0..=count)
        .map(|i| {
            if i == count {
                return stop;
            }
            let t = i as f64 / count as f64;
            Point::new(
                start.x + (stop.x - start.x) * t,
                start.y + (stop.y - start.y) * t,
            )
        })
        .collect()
}

/// Counters for one drill program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrillReport {
    /// Hits per tool number, slot subdivisions included.
    pub holes: BTreeMap<u32, usize>,
    /// Slots milled rather than drilled.
    pub milled_slots: usize,
    pub lines: usize,
}

impl DrillReport {
    pub fn total_holes(&self) -> usize {
        self.holes.values().sum()
    }
}

pub struct DrillEmitter {
    params: DrillParameters,
    templates: ProgramTemplates,
}

impl DrillEmitter {
    pub fn new(params: DrillParameters, templates: ProgramTemplates) -> Self {
        Self { params, templates }
    }

    pub fn params(&self) -> &DrillParameters {
        &self.params
    }

    fn place(&self, point: Point) -> Point {
        match self.params.mirror_axis {
            Some(axis) => Point::new(2.0 * axis - point.x, point.y),
            None => point,
        }
    }

    /// Write a complete drill program for every drill-classified net of `image`.
    pub fn write<W: Write>(
        &self,
        image: &Image,
        driver: &mut MachineDriver<W>,
    ) -> Result<DrillReport> {
        let p = &self.params;
        let lines_before = driver.lines_written();
        let frame = FrameValues {
            spindle_speed: p.spindle_speed,
            lift: p.lift,
            tool_change_height: p.tool_change_height,
        };
        driver.set_drill_settings(DrillSettings {
            depth: p.depth,
            lift: p.lift,
            feed_rate: p.feed_rate,
            pause: p.pause,
        });

        self.templates.write_header(driver, p.metric_output, &frame)?;

        let mut report = DrillReport::default();
        for number in image.drill_apertures() {
            let diameter = match image.aperture(number).and_then(|a| a.primary_dimension()) {
                Some(diameter) if diameter > 0.0 => diameter,
                _ => {
                    warn!("Tool {} has no usable diameter, skipped", number);
                    continue;
                }
            };
            self.templates.write_tool_change(
                driver,
                &ToolChange {
                    tool: number,
                    diameter,
                    lift: p.lift,
                    tool_change_height: p.tool_change_height,
                    spindle_speed: p.spindle_speed,
                    pause: p.pause,
                },
            )?;

            let mut hits = 0;
            for net in image.nets.iter().filter(|n| n.aperture == number) {
                match net.aperture_state {
                    ApertureState::Flash => {
                        let at = self.place(net.stop);
                        driver.drill_move(at.x, at.y, DrillOverrides::default())?;
                        hits += 1;
                    }
                    ApertureState::On if net.is_slot() => {
                        let (start, stop) = (self.place(net.start), self.place(net.stop));
                        if p.slots {
                            for at in slot_points(start, stop, diameter, p.overlap) {
                                driver.drill_move(at.x, at.y, DrillOverrides::default())?;
                                hits += 1;
                            }
                        } else {
                            self.mill_slot(start, stop, driver)?;
                            report.milled_slots += 1;
                        }
                    }
                    _ => {}
                }
            }
            debug!("Tool {} ({:.4}): {} hit(s)", number, diameter, hits);
            report.holes.insert(number, hits);
        }

        self.templates.write_footer(driver, &frame)?;
        report.lines = driver.lines_written() - lines_before;
        Ok(report)
    }

    fn mill_slot<W: Write>(
        &self,
        start: Point,
        stop: Point,
        driver: &mut MachineDriver<W>,
    ) -> Result<()> {
        let p = &self.params;
        driver.rapid_move(Motion::xy(start.x, start.y))?;
        driver.linear_move(Motion::z(p.depth).with_feed(p.feed_rate))?;
        driver.linear_move(Motion::xy(stop.x, stop.y))?;
        driver.rapid_move(Motion::z(p.lift))?;
        Ok(())
    }
}
