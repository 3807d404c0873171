use pcbmill_camtools::import::read_file;
use pcbmill_camtools::InputKind;
use pcbmill_core::{ApertureState, MeasurementSystem};
use std::io::Write;
use tempfile::NamedTempFile;

const DRILLS: &str = "M48
;DRILL file
FMAT,2
METRIC,TZ
T1C0.800
T2C3.000
%
G90
G05
T1
X2.54Y2.54
X5.08Y2.54
T2
X10.0Y10.0G85X15.0Y10.0
T0
M30
";

#[test]
fn test_read_excellon_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(DRILLS.as_bytes()).unwrap();

    let (image, kind) = read_file(file.path()).unwrap();
    assert_eq!(kind, InputKind::Excellon);
    assert_eq!(image.unit, MeasurementSystem::Metric);
    assert_eq!(image.drill_apertures(), vec![1, 2]);

    let flashes = image
        .nets
        .iter()
        .filter(|n| n.aperture_state == ApertureState::Flash)
        .count();
    assert_eq!(flashes, 2);
    assert_eq!(image.nets.iter().filter(|n| n.is_slot()).count(), 1);
}

#[test]
fn test_empty_drill_file_is_an_error() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"M48\nMETRIC\nT1C0.8\n%\nM30\n").unwrap();
    let err = read_file(file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("No drawable content"));
}
