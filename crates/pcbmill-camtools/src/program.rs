//! Header, footer and tool-change blocks shared by both emitters.

use crate::error::Result;
use crate::machine::MachineDriver;
use crate::template::{CodeTemplate, TemplateValue};
use std::io::Write;

/// Placeholder names of header and footer templates.
pub const FRAME_FIELDS: [&str; 3] = ["spindle_speed", "lift", "tool_change_height"];
/// Placeholder names of the tool-change template.
pub const TOOL_CHANGE_FIELDS: [&str; 6] = [
    "tool",
    "diameter",
    "lift",
    "tool_change_height",
    "spindle_speed",
    "pause",
];

/// Values for a header or footer, lengths in input units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameValues {
    pub spindle_speed: f64,
    pub lift: f64,
    pub tool_change_height: f64,
}

/// Values for a tool-change block, lengths in input units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolChange {
    pub tool: u32,
    pub diameter: f64,
    pub lift: f64,
    pub tool_change_height: f64,
    pub spindle_speed: f64,
    pub pause: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramTemplates {
    header: CodeTemplate,
    footer: CodeTemplate,
    tool_change: CodeTemplate,
}

impl ProgramTemplates {
    pub fn new(header: &str, footer: &str, tool_change: &str) -> Self {
        Self {
            header: CodeTemplate::new(header, &FRAME_FIELDS),
            footer: CodeTemplate::new(footer, &FRAME_FIELDS),
            tool_change: CodeTemplate::new(tool_change, &TOOL_CHANGE_FIELDS),
        }
    }

    fn frame_values(values: &FrameValues, scale: f64) -> [TemplateValue; 3] {
        [
            TemplateValue::Number(values.spindle_speed),
            TemplateValue::Number(values.lift * scale),
            TemplateValue::Number(values.tool_change_height * scale),
        ]
    }

    /// Unit and coordinate mode, then the header block.
    pub fn write_header<W: Write>(
        &self,
        driver: &mut MachineDriver<W>,
        metric_output: bool,
        values: &FrameValues,
    ) -> Result<()> {
        driver.metric_mode(metric_output)?;
        driver.relative_mode(false)?;
        let text = self.header.render(&Self::frame_values(values, driver.scale()))?;
        driver.insert_code(&text)
    }

    pub fn write_footer<W: Write>(
        &self,
        driver: &mut MachineDriver<W>,
        values: &FrameValues,
    ) -> Result<()> {
        let text = self.footer.render(&Self::frame_values(values, driver.scale()))?;
        driver.insert_code(&text)
    }

    pub fn write_tool_change<W: Write>(
        &self,
        driver: &mut MachineDriver<W>,
        change: &ToolChange,
    ) -> Result<()> {
        let scale = driver.scale();
        let values = [
            TemplateValue::from(change.tool),
            TemplateValue::Number(change.diameter * scale),
            TemplateValue::Number(change.lift * scale),
            TemplateValue::Number(change.tool_change_height * scale),
            TemplateValue::Number(change.spindle_speed),
            TemplateValue::Number(change.pause * scale),
        ];
        let text = self.tool_change.render(&values)?;
        driver.insert_code(&text)
    }
}
