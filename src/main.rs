use anyhow::Result;
use clap::Parser;
use pcbmill::{init_logging, BUILD_DATE, VERSION};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "pcbmill")]
#[command(about = "Generate isolation-routing and drilling G-code from Gerber and Excellon files", long_about = None)]
#[command(version)]
struct Cli {
    /// Gerber or Excellon input file
    input: PathBuf,

    /// G-code file to write
    output: PathBuf,

    /// Machine configuration (`key : value` text or .toml/.json)
    config: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;
    info!("pcbmill {} (built {})", VERSION, BUILD_DATE);

    let summary = pcbmill::run(&cli.input, &cli.output, &cli.config)?;
    info!(
        "Wrote {} line(s) of {} G-code to {}",
        summary.lines,
        summary.kind,
        cli.output.display()
    );
    Ok(())
}
