//! Load configuration and input, synthesize, and write one G-code program.

use anyhow::{Context, Result};
use pcbmill_camtools::{
    import, plan_passes, synthesize, DrillEmitter, DrillParameters, DrillReport, InputKind,
    IsoRoutingEmitter, IsoRoutingParameters, MachineCodes, MachineDriver, MirrorLine,
    ProgramTemplates, SynthesisReport,
};
use pcbmill_core::{ApertureState, Image};
use pcbmill_settings::MachineConfig;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// What one run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub kind: InputKind,
    /// G-code lines written.
    pub lines: usize,
    /// Isolation passes emitted; zero for drill files.
    pub passes: usize,
    pub synthesis: Option<SynthesisReport>,
    pub drill: Option<DrillReport>,
}

/// Convert `input` into a G-code program at `output` using `config`.
///
/// Configuration and input are fully loaded before the output file is
/// created, so a bad config never leaves a partial program behind.
pub fn run(input: &Path, output: &Path, config: &Path) -> Result<RunSummary> {
    let config = MachineConfig::load_from_file(config)
        .with_context(|| format!("Failed to load configuration {}", config.display()))?;
    let (image, kind) = import::read_file(input)?;

    let file = File::create(output)
        .with_context(|| format!("Failed to create output file {}", output.display()))?;
    let summary = generate(&image, kind, &config, BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(summary)
}

fn templates(config: &MachineConfig) -> ProgramTemplates {
    ProgramTemplates::new(
        &config.code_header,
        &config.code_footer,
        &config.code_tool_change,
    )
}

fn machine_codes(config: &MachineConfig) -> MachineCodes {
    MachineCodes {
        absolute: config.code_absolute.clone(),
        relative: config.code_relative.clone(),
        metric: config.code_metric.clone(),
        imperial: config.code_imperial.clone(),
    }
}

/// Write the program for an already decoded image to `out`.
pub fn generate<W: Write>(
    image: &Image,
    kind: InputKind,
    config: &MachineConfig,
    out: W,
) -> Result<RunSummary> {
    let mut driver = MachineDriver::new(out, machine_codes(config), &config.code_drill);
    driver.set_input_unit(image.unit.is_metric());
    // configured lengths are in output units, emitters take input units
    let to_input = config.output_system().conversion_factor(image.unit);

    let summary = match kind {
        InputKind::Gerber => isolate(image, config, to_input, &mut driver)?,
        InputKind::Excellon => drill(image, config, to_input, &mut driver)?,
    };
    driver.flush()?;
    Ok(summary)
}

fn isolate<W: Write>(
    image: &Image,
    config: &MachineConfig,
    to_input: f64,
    driver: &mut MachineDriver<W>,
) -> Result<RunSummary> {
    let orientation = config.iso_orientation;
    let configured_axis = config.mirror_axis_x.map(|x| x * to_input);

    let (region, report) = match (config.iso_mirror, configured_axis) {
        (true, Some(axis)) => {
            let synthesis = synthesize(image, orientation, Some(MirrorLine::Vertical(axis)));
            (synthesis.region, synthesis.report)
        }
        (true, None) => {
            let synthesis = synthesize(image, orientation, None);
            let region = match synthesis.region.bounding_box() {
                Some((min, max)) => {
                    let axis = (min.x + max.x) / 2.0;
                    info!("Mirroring across x = {:.4}", axis);
                    synthesis.region.mirrored_x(axis).oriented(orientation)
                }
                None => synthesis.region,
            };
            (region, synthesis.report)
        }
        (false, _) => {
            let synthesis = synthesize(image, orientation, None);
            (synthesis.region, synthesis.report)
        }
    };
    if region.is_empty() {
        warn!("Copper region is empty, program will contain no cuts");
    }

    let diameters: Vec<f64> = config
        .iso_tool_diameters
        .iter()
        .map(|d| d * to_input)
        .collect();
    let plan = plan_passes(&diameters, config.iso_passes, config.iso_pass_overlap);

    let emitter = IsoRoutingEmitter::new(
        IsoRoutingParameters {
            orientation,
            mirror: config.iso_mirror,
            cut_depth: config.iso_cut_depth * to_input,
            lift: config.iso_lift * to_input,
            feed_rate: config.iso_feed_rate * to_input,
            plunge_feed_rate: config.iso_plunge_feed_rate * to_input,
            spindle_speed: config.spindle_speed,
            tool_change_height: config.tool_change_height * to_input,
            pause: config.drill_pause * to_input,
            metric_output: config.generate_metric,
        },
        templates(config),
    );

    let mut lines = 0;
    for pass in &plan {
        let offset = region.offset(pass.offset);
        let stats = emitter.write(&offset, pass, driver)?;
        info!(
            "Tool {} pass {}: {} ring(s)",
            pass.tool + 1,
            pass.pass + 1,
            stats.rings
        );
        lines += stats.lines;
    }

    Ok(RunSummary {
        kind: InputKind::Gerber,
        lines,
        passes: plan.len(),
        synthesis: Some(report),
        drill: None,
    })
}

/// Centre of every drill hit and slot endpoint along x.
fn drill_centre_x(image: &Image) -> Option<f64> {
    let xs = image
        .nets
        .iter()
        .filter(|net| net.is_drill_hit())
        .flat_map(|net| match net.aperture_state {
            ApertureState::Flash => vec![net.stop.x],
            _ => vec![net.start.x, net.stop.x],
        });
    let (min, max) = xs.fold(None, |bounds: Option<(f64, f64)>, x| match bounds {
        Some((min, max)) => Some((min.min(x), max.max(x))),
        None => Some((x, x)),
    })?;
    Some((min + max) / 2.0)
}

fn drill<W: Write>(
    image: &Image,
    config: &MachineConfig,
    to_input: f64,
    driver: &mut MachineDriver<W>,
) -> Result<RunSummary> {
    let mirror_axis = if config.iso_mirror {
        config
            .mirror_axis_x
            .map(|x| x * to_input)
            .or_else(|| drill_centre_x(image))
    } else {
        None
    };

    let emitter = DrillEmitter::new(
        DrillParameters {
            depth: config.drill_depth * to_input,
            lift: config.drill_lift * to_input,
            feed_rate: config.drill_feed_rate * to_input,
            pause: config.drill_pause * to_input,
            slots: config.drill_slots,
            overlap: config.drill_overlap,
            spindle_speed: config.spindle_speed,
            tool_change_height: config.tool_change_height * to_input,
            metric_output: config.generate_metric,
            mirror_axis,
        },
        templates(config),
    );
    let report = emitter.write(image, driver)?;
    for (tool, holes) in &report.holes {
        info!("T{}: {} hole(s)", tool, holes);
    }

    Ok(RunSummary {
        kind: InputKind::Excellon,
        lines: report.lines,
        passes: 0,
        synthesis: None,
        drill: Some(report),
    })
}
