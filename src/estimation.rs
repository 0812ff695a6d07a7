use tracing::debug;

use crate::models::{CalibrationResult, Measurement, QualityWarning, ReferenceObject, SoilLine};

/// Net erosion in millimeters, before clamping.
///
/// Negative values mean the soil surface sits above the installation baseline.
pub fn raw_erosion_mm(exposed_px: f32, baseline_exposed_mm: f32, calibration: &CalibrationResult) -> f32 {
    let baseline_px = calibration.to_pixels(baseline_exposed_mm);
    calibration.to_mm(exposed_px - baseline_px)
}

/// Combine upstream results into a measurement for one photo.
pub fn estimate_erosion(
    source_id: &str,
    reference: &ReferenceObject,
    soil_line: &SoilLine,
    calibration: &CalibrationResult,
    baseline_exposed_mm: f32,
) -> Measurement {
    let raw_depth_mm = raw_erosion_mm(soil_line.offset_px, baseline_exposed_mm, calibration);
    let depth_mm = raw_depth_mm.max(0.0);

    let mut notes = Vec::new();
    if raw_depth_mm < 0.0 {
        debug!("{}: soil above baseline by {:.1}mm, reporting zero erosion", source_id, -raw_depth_mm);
        notes.push(QualityWarning::Accretion);
    }
    if soil_line.low_quality {
        notes.push(QualityWarning::LowSoilLineQuality);
    }

    let confidence = (reference.confidence.clamp(0.0, 1.0) * soil_line.quality.clamp(0.0, 1.0)).sqrt();

    Measurement {
        source_id: source_id.to_string(),
        depth_mm,
        raw_depth_mm,
        exposed_length_mm: calibration.to_mm(soil_line.offset_px),
        confidence,
        notes,
    }
}
