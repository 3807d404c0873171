use pcbmill::{generate, run};
use pcbmill_camtools::{read_str, InputKind};
use pcbmill_settings::MachineConfig;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CONFIG: &str = "# minimal machine
iso_tool_diameters : 0.2
iso_cut_depth : -0.1
drill_depth : -1.8
";

const GERBER: &str = "%FSLAX46Y46*%
%MOMM*%
%ADD10C,1.000000*%
D10*
X0Y0D03*
X5000000Y0D03*
M02*
";

const EXCELLON: &str = "M48
INCH,TZ
T1C0.0315
%
T1
X010000Y010000
M30
";

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_gerber_isolation_program() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "top.gbr", GERBER);
    let config = write(&dir, "machine.cfg", CONFIG);
    let output = dir.path().join("top.nc");

    let summary = run(&input, &output, &config).unwrap();
    assert_eq!(summary.kind, InputKind::Gerber);
    assert_eq!(summary.passes, 1);

    let text = read(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(&lines[..2], &["G21", "G90"]);
    assert!(text.contains("M3 S10000"));
    assert!(text.contains("G1 Z-0.1000 F50.0"));
    // two separate pads, one ring each
    assert_eq!(text.matches("G1 F200.0").count(), 2);
    assert!(text.ends_with("M5\nM30\n"));
    assert_eq!(summary.lines, lines.len());
}

#[test]
fn test_excellon_inch_input_metric_output() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "holes.drl", EXCELLON);
    let config = write(&dir, "machine.cfg", CONFIG);
    let output = dir.path().join("holes.nc");

    let summary = run(&input, &output, &config).unwrap();
    assert_eq!(summary.kind, InputKind::Excellon);
    assert_eq!(summary.drill.map(|d| d.total_holes()), Some(1));

    let text = read(&output);
    assert!(text.starts_with("G21\nG90\n"));
    assert!(text.contains("M6 T1"));
    assert!(text.contains("diameter 0.800"));
    assert!(text.contains("G81 X25.4000 Y25.4000 Z-1.8000 R1.0000 F100.0"));
}

#[test]
fn test_imperial_output_from_metric_input() {
    let config = MachineConfig {
        generate_metric: false,
        drill_depth: -0.07,
        drill_lift: 0.04,
        drill_feed_rate: 4.0,
        ..MachineConfig::default()
    };
    let (image, kind) = read_str(
        "M48\nMETRIC,TZ\nT1C0.8\n%\nT1\nX25.4Y12.7\nM30\n",
    )
    .unwrap();

    let mut out = Vec::new();
    generate(&image, kind, &config, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("G20\nG90\n"));
    assert!(text.contains("G81 X1.0000 Y0.5000 Z-0.0700 R0.0400 F4.0"));
}

#[test]
fn test_bad_config_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "top.gbr", GERBER);
    let config = write(&dir, "machine.cfg", "iso_tool_diameters : 0.2\n");
    let output = dir.path().join("top.nc");

    let err = run(&input, &output, &config).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("machine.cfg"));
    assert!(message.contains("iso_cut_depth"));
    assert!(message.contains("drill_depth"));
    assert!(!output.exists());
}

#[test]
fn test_missing_input_names_file() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "machine.cfg", CONFIG);
    let input = dir.path().join("missing.gbr");
    let output = dir.path().join("out.nc");

    let err = run(&input, &output, &config).unwrap_err();
    assert!(format!("{:#}", err).contains("missing.gbr"));
    assert!(!output.exists());
}
