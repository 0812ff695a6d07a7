use tracing::debug;

use crate::error::CalibrationError;
use crate::models::{CalibrationResult, ReferenceObject};

/// Pixel lengths at or below this are treated as degenerate.
pub const MIN_PIXEL_LENGTH: f32 = 1e-3;

/// Derive the pixels-per-millimeter ratio from a pixel length and the known physical length.
pub fn calibrate(pixel_length: f32, physical_length_mm: f32) -> Result<CalibrationResult, CalibrationError> {
    if !physical_length_mm.is_finite() || physical_length_mm <= 0.0 {
        return Err(CalibrationError::InvalidPhysicalLength(physical_length_mm));
    }
    if !pixel_length.is_finite() || pixel_length <= MIN_PIXEL_LENGTH {
        return Err(CalibrationError::DegeneratePixelLength(pixel_length));
    }

    let pixels_per_mm = pixel_length / physical_length_mm;
    debug!("Calibrated {:.1}px / {:.1}mm = {:.4} px/mm", pixel_length, physical_length_mm, pixels_per_mm);

    Ok(CalibrationResult {
        pixels_per_mm,
        physical_length_mm,
    })
}

/// Calibrate from a detected reference object.
pub fn calibrate_reference(
    reference: &ReferenceObject,
    physical_length_mm: f32,
) -> Result<CalibrationResult, CalibrationError> {
    calibrate(reference.pixel_length, physical_length_mm)
}
