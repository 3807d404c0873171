use pcbmill_core::{Aperture, Image, MeasurementSystem, Net, Point};

#[test]
fn image_serializes_to_json() {
    let mut image = Image::new(MeasurementSystem::Imperial);
    image.add_aperture(10, Aperture::circle(0.04));
    image.push_net(Net::flash(Point::new(0.5, 0.25), 10));

    let json = serde_json::to_string(&image).unwrap();
    let back: Image = serde_json::from_str(&json).unwrap();
    assert_eq!(back, image);
    assert_eq!(back.levels.len(), 1);
    assert_eq!(back.states.len(), 1);
}

#[test]
fn nets_reference_levels_by_index() {
    let mut image = Image::new(MeasurementSystem::Metric);
    let clear = image.push_level(pcbmill_core::Level {
        polarity: pcbmill_core::Polarity::Clear,
        ..Default::default()
    });
    image.push_net(Net::flash(Point::ORIGIN, 10).in_level(clear, 0));

    let net = &image.nets[0];
    let level = image.level(net.level).unwrap();
    assert_eq!(level.polarity, pcbmill_core::Polarity::Clear);
    assert!(image.level(99).is_none());
}
