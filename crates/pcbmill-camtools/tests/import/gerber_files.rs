use pcbmill_camtools::import::read_file;
use pcbmill_camtools::{synthesize, InputKind};
use pcbmill_core::{Orientation, Polarity};
use std::io::Write;
use tempfile::NamedTempFile;

const BOARD: &str = "G04 two pads and a trace*
%FSLAX46Y46*%
%MOMM*%
%ADD10C,1.000000*%
%ADD11C,0.250000*%
%LPD*%
D10*
X0Y0D03*
X10000000Y0D03*
D11*
X0Y0D02*
X10000000Y0D01*
M02*
";

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_read_and_synthesize_gerber_file() {
    let file = write_temp(BOARD);
    let (image, kind) = read_file(file.path()).unwrap();
    assert_eq!(kind, InputKind::Gerber);
    assert_eq!(image.levels[0].polarity, Polarity::Dark);

    let result = synthesize(&image, Orientation::Ccw, None);
    assert_eq!(result.region.polygons.len(), 1, "pads joined by the trace");
    assert_eq!(result.report.flashes, 2);
    assert_eq!(result.report.strokes, 1);
}

#[test]
fn test_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.gbr");
    let err = read_file(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.gbr"));
}
