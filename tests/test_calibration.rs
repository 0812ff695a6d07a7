mod common;

use erosionwatch::calibration::{calibrate, calibrate_reference};
use erosionwatch::error::CalibrationError;

use common::*;

#[test]
fn test_ratio_is_pixels_over_millimeters() -> anyhow::Result<()> {
    let cal = calibrate(400.0, 200.0)?;
    assert_eq!(cal.pixels_per_mm, 2.0);
    assert_eq!(cal.physical_length_mm, 200.0);
    assert_eq!(cal.to_mm(40.0), 20.0);
    assert_eq!(cal.to_pixels(10.0), 20.0);
    Ok(())
}

#[test]
fn test_ratio_scales_linearly() -> anyhow::Result<()> {
    for pixel_length in [37.0, 240.0, 1234.5] {
        let single = calibrate(pixel_length, 150.0)?;
        let double = calibrate(pixel_length, 300.0)?;
        assert!(single.pixels_per_mm > 0.0);
        assert!((double.pixels_per_mm * 2.0 - single.pixels_per_mm).abs() < 1e-5);
    }
    Ok(())
}

#[test]
fn test_degenerate_pixel_length() {
    assert_eq!(
        calibrate(0.0, 300.0).unwrap_err(),
        CalibrationError::DegeneratePixelLength(0.0)
    );
    assert!(matches!(
        calibrate(1e-4, 300.0),
        Err(CalibrationError::DegeneratePixelLength(_))
    ));
    assert!(matches!(
        calibrate(f32::NAN, 300.0),
        Err(CalibrationError::DegeneratePixelLength(_))
    ));
}

#[test]
fn test_invalid_physical_length() {
    assert_eq!(
        calibrate(400.0, 0.0).unwrap_err(),
        CalibrationError::InvalidPhysicalLength(0.0)
    );
    assert!(matches!(
        calibrate(400.0, -12.0),
        Err(CalibrationError::InvalidPhysicalLength(_))
    ));
}

#[test]
fn test_calibrate_from_reference() -> anyhow::Result<()> {
    let reference = vertical_reference(50.0, 10.0, 400.0, 8.0, 0.9);
    let cal = calibrate_reference(&reference, 200.0)?;
    assert_eq!(cal.pixels_per_mm, 2.0);
    Ok(())
}
