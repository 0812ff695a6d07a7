mod common;

use erosionwatch::config::SoilLineConfig;
use erosionwatch::error::SoilLineError;
use erosionwatch::soil_line::{find_transition, locate_soil_line, signature_len, transition_quality};

use common::*;

#[test]
fn test_transition_needs_a_sustained_run() {
    let mut deviations = vec![2.0; 40];
    // Speckle: isolated spikes and a run one sample too short
    deviations[5] = 90.0;
    deviations[12] = 90.0;
    deviations[13] = 90.0;
    for d in &mut deviations[20..24] {
        *d = 90.0;
    }
    for d in &mut deviations[30..] {
        *d = 80.0;
    }

    assert_eq!(find_transition(&deviations, 30.0, 5), Some(30));
    // With a shorter run the four-sample blip counts
    assert_eq!(find_transition(&deviations, 30.0, 4), Some(20));
}

#[test]
fn test_no_transition() {
    let deviations = vec![10.0; 50];
    assert_eq!(find_transition(&deviations, 30.0, 5), None);
    assert_eq!(find_transition(&[], 30.0, 5), None);
}

#[test]
fn test_sharp_transition_scores_higher_than_gradual() {
    let mut sharp = vec![0.0; 30];
    for d in &mut sharp[15..] {
        *d = 100.0;
    }

    // Slow ramp, and the buried part flickers back below threshold
    let mut gradual: Vec<f32> = (0..30).map(|i| (i as f32 * 2.5).min(40.0)).collect();
    for i in (19..30).step_by(2) {
        gradual[i] = 10.0;
    }

    let sharp_start = find_transition(&sharp, 30.0, 5).unwrap();
    let gradual_start = find_transition(&gradual, 30.0, 5).unwrap();
    let sharp_q = transition_quality(&sharp, sharp_start, 30.0, 5);
    let gradual_q = transition_quality(&gradual, gradual_start, 30.0, 5);

    assert_eq!(sharp_q, 1.0);
    assert!(gradual_q < 0.5, "gradual quality {}", gradual_q);
    assert!((0.0..=1.0).contains(&gradual_q));
}

#[test]
fn test_locates_soil_line_on_photo() -> anyhow::Result<()> {
    let photo = PinPhoto::default();
    let image = photo.render();
    let reference = vertical_reference(100.0, photo.pin_y.0 as f32, photo.pin_length_px() as f32, 8.0, 0.9);

    let soil_line = locate_soil_line(&image, &reference, &SoilLineConfig::default())?;

    assert_eq!(soil_line.offset_px, photo.exposed_px() as f32);
    assert_eq!(soil_line.position.y, photo.soil_row.unwrap() as f32);
    assert!(soil_line.quality > 0.9, "quality {}", soil_line.quality);
    assert!(!soil_line.low_quality);
    // Offset lies between the endpoints
    assert!(soil_line.offset_px > 0.0 && soil_line.offset_px < reference.pixel_length);
    Ok(())
}

#[test]
fn test_ticks_are_not_mistaken_for_soil() -> anyhow::Result<()> {
    let photo = PinPhoto {
        ticks: Some(10),
        ..PinPhoto::default()
    };
    let reference = vertical_reference(100.0, photo.pin_y.0 as f32, photo.pin_length_px() as f32, 8.0, 0.9);

    let soil_line = locate_soil_line(&photo.render(), &reference, &SoilLineConfig::default())?;
    assert_eq!(soil_line.offset_px, photo.exposed_px() as f32);
    Ok(())
}

#[test]
fn test_run_length_is_configurable() -> anyhow::Result<()> {
    // With a run length of 1 the first tick already counts as soil
    let photo = PinPhoto {
        ticks: Some(20),
        ..PinPhoto::default()
    };
    let image = photo.render();
    let reference = vertical_reference(100.0, photo.pin_y.0 as f32, photo.pin_length_px() as f32, 8.0, 0.9);

    let eager = SoilLineConfig {
        transition_run_length: 1,
        ..SoilLineConfig::default()
    };
    let early = locate_soil_line(&image, &reference, &eager)?;
    assert_eq!(early.offset_px, 20.0);

    let default = locate_soil_line(&image, &reference, &SoilLineConfig::default())?;
    assert_eq!(default.offset_px, photo.exposed_px() as f32);
    Ok(())
}

#[test]
fn test_fully_exposed_pin_has_no_soil_line() {
    let photo = PinPhoto {
        soil_row: None,
        ..PinPhoto::default()
    };
    let reference = vertical_reference(100.0, photo.pin_y.0 as f32, photo.pin_length_px() as f32, 8.0, 0.9);

    let result = locate_soil_line(&photo.render(), &reference, &SoilLineConfig::default());
    assert_eq!(result, Err(SoilLineError::NoTransition { run_length: 5 }));
}

#[test]
fn test_too_short_reference() {
    let photo = PinPhoto::default();
    let reference = vertical_reference(100.0, 30.0, 6.0, 8.0, 0.9);

    let result = locate_soil_line(&photo.render(), &reference, &SoilLineConfig::default());
    assert!(matches!(result, Err(SoilLineError::TooFewSamples { samples: 6, .. })));
}

#[test]
fn test_gradual_stain_is_flagged_low_quality() -> anyhow::Result<()> {
    // Mud creeps up the pin: colour fades over 60 rows, then buried rows flicker
    let image = image::DynamicImage::ImageRgb8(image::ImageBuffer::from_fn(60, 200, |x, y| {
        if !(26..34).contains(&x) {
            return image::Rgb(SOIL);
        }
        let t = ((y as f32 - 80.0) / 60.0).clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        if y > 140 && y % 3 != 0 {
            return image::Rgb(PIN_EXPOSED);
        }
        image::Rgb([
            mix(PIN_EXPOSED[0], PIN_BURIED[0]),
            mix(PIN_EXPOSED[1], PIN_BURIED[1]),
            mix(PIN_EXPOSED[2], PIN_BURIED[2]),
        ])
    }));
    let reference = vertical_reference(30.0, 0.0, 200.0, 8.0, 0.9);

    let soil_line = locate_soil_line(&image, &reference, &SoilLineConfig::default())?;
    assert!(soil_line.low_quality, "quality {}", soil_line.quality);
    assert!(soil_line.offset_px > 80.0 && soil_line.offset_px < 110.0);
    Ok(())
}

/// 400px pin from row 10 with `exposed` rows above the soil.
fn long_pin(exposed: u32) -> (image::DynamicImage, erosionwatch::models::ReferenceObject) {
    let photo = PinPhoto {
        height: 420,
        pin_y: (10, 410),
        soil_row: Some(10 + exposed),
        ..PinPhoto::default()
    };
    (photo.render(), vertical_reference(100.0, 10.0, 400.0, 8.0, 0.9))
}

#[test]
fn test_signature_window_is_capped() {
    // 10% of the axis, at most two runs, at least three samples
    assert_eq!(signature_len(400, 0.1, 5), 10);
    assert_eq!(signature_len(24, 0.25, 5), 6);
    assert_eq!(signature_len(20, 0.1, 5), 3);
    assert_eq!(signature_len(240, 0.1, 1), 3);
}

#[test]
fn test_short_exposed_section_on_long_pin() -> anyhow::Result<()> {
    for exposed in [30, 20, 12] {
        let (image, reference) = long_pin(exposed);
        let soil_line = locate_soil_line(&image, &reference, &SoilLineConfig::default())?;
        assert_eq!(soil_line.offset_px, exposed as f32);
        assert_eq!(soil_line.quality, 1.0);
    }
    Ok(())
}

#[test]
fn test_soil_line_inside_signature_window_lowers_quality() -> anyhow::Result<()> {
    let (image, reference) = long_pin(7);
    let soil_line = locate_soil_line(&image, &reference, &SoilLineConfig::default())?;
    assert_eq!(soil_line.offset_px, 7.0);
    assert_close(soil_line.quality, 0.7, 1e-4);
    assert!(!soil_line.low_quality);
    Ok(())
}

#[test]
fn test_mostly_buried_window_is_an_error() {
    // Half the window buried: the signature falls between the two colours
    let (image, reference) = long_pin(5);
    let result = locate_soil_line(&image, &reference, &SoilLineConfig::default());
    assert_eq!(result, Err(SoilLineError::NonUniformTop { window: 10 }));

    // Most of it buried: the signature is buried pin and nothing below departs from it
    let (image, reference) = long_pin(3);
    let result = locate_soil_line(&image, &reference, &SoilLineConfig::default());
    assert_eq!(result, Err(SoilLineError::NoTransition { run_length: 5 }));
}
