use pcbmill_camtools::{synthesize, MirrorLine};
use pcbmill_core::{
    Aperture, Image, Level, MeasurementSystem, Net, NetState, Orientation, Point, Polarity,
};
use std::f64::consts::PI;

fn metric_image() -> Image {
    Image::new(MeasurementSystem::Metric)
}

#[test]
fn test_circular_flash_area_and_extent() {
    let mut image = metric_image();
    image.add_aperture(10, Aperture::circle(1.0));
    image.push_net(Net::flash(Point::new(3.0, -2.0), 10));

    let result = synthesize(&image, Orientation::Ccw, None);
    let expected = PI * 0.25;
    assert!((result.region.area() - expected).abs() / expected < 0.01);

    for ring in result.region.rings() {
        for p in ring.points() {
            assert!(p.distance(&Point::new(3.0, -2.0)) <= 0.5 + 1e-9);
        }
    }
}

#[test]
fn test_stroke_matches_stadium_area() {
    let mut image = metric_image();
    image.add_aperture(10, Aperture::circle(0.5));
    image.push_net(Net::line(Point::new(0.0, 0.0), Point::new(4.0, 3.0), 10));

    let result = synthesize(&image, Orientation::Ccw, None);
    let expected = 0.5 * 5.0 + PI * 0.25 * 0.25;
    assert!((result.region.area() - expected).abs() / expected < 0.01);
    assert_eq!(result.report.strokes, 1);
}

#[test]
fn test_clear_flash_empties_region() {
    let mut image = metric_image();
    image.add_aperture(10, Aperture::circle(1.0));
    image.add_aperture(11, Aperture::circle(2.0));
    image.push_net(Net::flash(Point::ORIGIN, 10));
    image.push_net(Net::flash(Point::ORIGIN, 10));

    let clear = image.push_level(Level {
        polarity: Polarity::Clear,
        ..Level::default()
    });
    image.push_net(Net::flash(Point::ORIGIN, 11).in_level(clear, 0));

    let result = synthesize(&image, Orientation::Ccw, None);
    assert!(result.region.area() < 1e-9);
    assert!(result.region.is_empty());
    assert_eq!(result.report.flashes, 3);
}

#[test]
fn test_unit_square_region() {
    let mut image = metric_image();
    let corners = [
        Point::new(0.0, 0.0),
        Point::new(1.0, 0.0),
        Point::new(1.0, 1.0),
        Point::new(0.0, 1.0),
    ];
    image.push_net(Net::region_start(corners[0]));
    image.push_net(Net::move_to(corners[0], corners[0], 0));
    for i in 0..4 {
        image.push_net(Net::line(corners[i], corners[(i + 1) % 4], 0));
    }
    image.push_net(Net::region_end(corners[0]));

    let result = synthesize(&image, Orientation::Ccw, None);
    assert!((result.region.area() - 1.0).abs() < 1e-9);
    assert_eq!(result.report.regions, 1);
    assert_eq!(result.report.dropped_rings, 0);
    let exterior = &result.region.polygons[0].exterior;
    assert_eq!(exterior.orientation(), Orientation::Ccw);
}

#[test]
fn test_clockwise_request_winds_exteriors_clockwise() {
    let mut image = metric_image();
    image.add_aperture(10, Aperture::circle(1.0));
    image.push_net(Net::flash(Point::ORIGIN, 10));

    let result = synthesize(&image, Orientation::Cw, None);
    assert_eq!(
        result.region.polygons[0].exterior.orientation(),
        Orientation::Cw
    );
}

#[test]
fn test_region_with_too_few_points_is_dropped() {
    let mut image = metric_image();
    image.push_net(Net::region_start(Point::ORIGIN));
    image.push_net(Net::line(Point::ORIGIN, Point::new(1.0, 0.0), 0));
    image.push_net(Net::region_end(Point::new(1.0, 0.0)));

    let result = synthesize(&image, Orientation::Ccw, None);
    assert!(result.region.is_empty());
    assert_eq!(result.report.dropped_rings, 1);
}

#[test]
fn test_mirror_line_reflects_region() {
    let mut image = metric_image();
    image.add_aperture(10, Aperture::Rectangle {
        width: 2.0,
        height: 1.0,
        hole: None,
    });
    image.push_net(Net::flash(Point::new(1.0, 0.0), 10));

    let result = synthesize(&image, Orientation::Ccw, Some(MirrorLine::Vertical(0.0)));
    let (min, max) = result.region.bounding_box().unwrap();
    assert!(min.approx_eq(&Point::new(-2.0, -0.5), 1e-9));
    assert!(max.approx_eq(&Point::new(0.0, 0.5), 1e-9));
}

fn quarter_arc(aperture: Aperture) -> Image {
    let mut image = metric_image();
    image.add_aperture(10, aperture);
    image.push_net(Net::arc(
        Point::new(5.0, 0.0),
        Point::new(0.0, 5.0),
        Point::ORIGIN,
        false,
        10,
    ));
    image
}

#[test]
fn test_circular_arc_stroke_has_round_caps() {
    let image = quarter_arc(Aperture::circle(1.0));
    let result = synthesize(&image, Orientation::Ccw, None);
    // quarter annulus plus two half-disc caps
    let expected = PI / 4.0 * (5.5_f64.powi(2) - 4.5_f64.powi(2)) + PI / 4.0;
    assert!((result.region.area() - expected).abs() / expected < 0.01);
    assert_eq!(result.region.polygons.len(), 1);
    assert_eq!(result.report.strokes, 1);
}

#[test]
fn test_rectangular_arc_stroke_has_flat_caps() {
    let image = quarter_arc(Aperture::Rectangle {
        width: 1.0,
        height: 1.0,
        hole: None,
    });
    let result = synthesize(&image, Orientation::Ccw, None);
    let expected = PI / 4.0 * (5.5_f64.powi(2) - 4.5_f64.powi(2));
    assert!((result.region.area() - expected).abs() / expected < 0.01);

    let (min, max) = result.region.bounding_box().unwrap();
    assert!(min.y.abs() < 1e-6, "no cap below the start edge");
    assert!(min.x.abs() < 1e-6, "no cap left of the end edge");
    assert!((max.x - 5.5).abs() < 1e-6);
}

#[test]
fn test_net_state_change_rebuilds_transform() {
    let mut image = metric_image();
    image.add_aperture(10, Aperture::circle(1.0));
    let doubled = image.push_state(NetState {
        scale_a: 2.0,
        scale_b: 2.0,
        ..NetState::default()
    });
    image.push_net(Net::flash(Point::new(1.0, 0.0), 10).in_level(0, doubled));
    image.push_net(Net::flash(Point::new(5.0, 0.0), 10));

    let result = synthesize(&image, Orientation::Ccw, None);
    assert_eq!(result.region.polygons.len(), 2);
    let (min, max) = result.region.bounding_box().unwrap();
    // scaled flash spans x 1..3 with radius 1, the default-state flash stays at x = 5
    assert!((min.x - 1.0).abs() < 0.01);
    assert!((max.y - 1.0).abs() < 0.01);
    assert!((max.x - 5.5).abs() < 0.01);
}

fn square(image: &mut Image, from: Point, lower_left: Point, size: f64) {
    let corners = [
        lower_left,
        lower_left.offset(size, 0.0),
        lower_left.offset(size, size),
        lower_left.offset(0.0, size),
    ];
    image.push_net(Net::move_to(from, corners[0], 0));
    for i in 0..4 {
        image.push_net(Net::line(corners[i], corners[(i + 1) % 4], 0));
    }
}

#[test]
fn test_region_with_arc_segment() {
    let mut image = metric_image();
    let right = Point::new(1.0, 0.0);
    let left = Point::new(-1.0, 0.0);
    image.push_net(Net::region_start(right));
    image.push_net(Net::move_to(right, right, 0));
    image.push_net(Net::arc(right, left, Point::ORIGIN, false, 0));
    image.push_net(Net::line(left, right, 0));
    image.push_net(Net::region_end(right));

    let result = synthesize(&image, Orientation::Ccw, None);
    let expected = PI / 2.0;
    assert!((result.region.area() - expected).abs() / expected < 0.01);
    let (min, max) = result.region.bounding_box().unwrap();
    assert!(min.y.abs() < 1e-9);
    assert!((max.y - 1.0).abs() < 1e-6);
}

#[test]
fn test_region_contours_are_filled_separately() {
    let mut image = metric_image();
    image.push_net(Net::region_start(Point::ORIGIN));
    square(&mut image, Point::ORIGIN, Point::ORIGIN, 1.0);
    square(&mut image, Point::ORIGIN, Point::new(3.0, 0.0), 1.0);
    image.push_net(Net::region_end(Point::new(3.0, 0.0)));

    let result = synthesize(&image, Orientation::Ccw, None);
    assert_eq!(result.region.polygons.len(), 2);
    assert!((result.region.area() - 2.0).abs() < 1e-9);
    assert_eq!(result.report.regions, 1);
}

#[test]
fn test_nested_region_contour_fills_instead_of_voiding() {
    let mut image = metric_image();
    image.push_net(Net::region_start(Point::ORIGIN));
    square(&mut image, Point::ORIGIN, Point::ORIGIN, 4.0);
    square(&mut image, Point::ORIGIN, Point::new(1.0, 1.0), 2.0);
    image.push_net(Net::region_end(Point::new(1.0, 1.0)));

    let result = synthesize(&image, Orientation::Ccw, None);
    assert_eq!(result.region.polygons.len(), 1);
    assert!(result.region.polygons[0].holes.is_empty());
    assert!((result.region.area() - 16.0).abs() < 1e-9);
}
