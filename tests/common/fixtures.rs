use erosionwatch::config::DetectorConfig;
use erosionwatch::error::DetectionError;
use erosionwatch::models::{
    CalibrationResult, Measurement, PixelPoint, QualityWarning, ReferenceObject, SoilLine,
};
use erosionwatch::recommendation::recommend;
use erosionwatch::risk::RiskTier;
use erosionwatch::{ImageAssessment, ImageFailure, ImageOutcome, FailureKind, ReferenceDetectorStrategy};
use image::{DynamicImage, ImageBuffer, Rgb};

/// Dry soil colour.
pub const SOIL: [u8; 3] = [110, 80, 55];
/// Clean exposed pin.
pub const PIN_EXPOSED: [u8; 3] = [215, 215, 215];
/// Mud-stained buried section.
pub const PIN_BURIED: [u8; 3] = [170, 140, 105];
/// Graduation tick.
pub const TICK: [u8; 3] = [40, 40, 40];

/// Deterministic soil grain in [-8, 8].
pub fn grain(x: u32, y: u32) -> i16 {
    ((x as u64 * 7919 + y as u64 * 104729) % 17) as i16 - 8
}

fn textured(color: [u8; 3], x: u32, y: u32) -> Rgb<u8> {
    let n = grain(x, y);
    Rgb(color.map(|c| (c as i16 + n).clamp(0, 255) as u8))
}

/// Builder for a synthetic field photo of a vertical reference pin.
#[derive(Debug, Clone)]
pub struct PinPhoto {
    pub width: u32,
    pub height: u32,
    /// First and one-past-last pin column.
    pub pin_x: (u32, u32),
    /// First and one-past-last pin row.
    pub pin_y: (u32, u32),
    /// First buried row; `None` leaves the whole pin exposed.
    pub soil_row: Option<u32>,
    /// Tick spacing in rows on the exposed part.
    pub ticks: Option<u32>,
    /// Rows hidden behind a soil-coloured occluder.
    pub occluder: Option<(u32, u32)>,
    /// Extra bright square: (x, y, side).
    pub blob: Option<(u32, u32, u32)>,
}

impl Default for PinPhoto {
    /// 200x300 photo, pin 8px wide and 240px long, soil line 120px below the top.
    fn default() -> Self {
        Self {
            width: 200,
            height: 300,
            pin_x: (96, 104),
            pin_y: (30, 270),
            soil_row: Some(150),
            ticks: None,
            occluder: None,
            blob: None,
        }
    }
}

impl PinPhoto {
    pub fn render(&self) -> DynamicImage {
        let img = ImageBuffer::from_fn(self.width, self.height, |x, y| {
            if let Some((y0, y1)) = self.occluder {
                if y >= y0 && y < y1 {
                    return textured(SOIL, x, y);
                }
            }
            if let Some((bx, by, side)) = self.blob {
                if x >= bx && x < bx + side && y >= by && y < by + side {
                    return Rgb(PIN_EXPOSED);
                }
            }

            let on_pin = x >= self.pin_x.0 && x < self.pin_x.1 && y >= self.pin_y.0 && y < self.pin_y.1;
            if !on_pin {
                return textured(SOIL, x, y);
            }

            let buried = self.soil_row.is_some_and(|row| y >= row);
            if buried {
                return Rgb(PIN_BURIED);
            }
            let on_tick = self.ticks.is_some_and(|step| {
                let from_top = y - self.pin_y.0;
                from_top > 0 && from_top % step == 0 && x > self.pin_x.0 && x + 1 < self.pin_x.1
            });
            if on_tick { Rgb(TICK) } else { Rgb(PIN_EXPOSED) }
        });
        DynamicImage::ImageRgb8(img)
    }

    /// True exposed length in pixels.
    pub fn exposed_px(&self) -> u32 {
        self.soil_row.unwrap_or(self.pin_y.1) - self.pin_y.0
    }

    pub fn pin_length_px(&self) -> u32 {
        self.pin_y.1 - self.pin_y.0
    }
}

/// Plain soil, nothing to detect.
pub fn soil_only(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| textured(SOIL, x, y)))
}

/// Soil with vertical bars; each bar is (x0, x1, y0, y1, gray).
pub fn bars(width: u32, height: u32, bars: &[(u32, u32, u32, u32, u8)]) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        for &(x0, x1, y0, y1, gray) in bars {
            if x >= x0 && x < x1 && y >= y0 && y < y1 {
                return Rgb([gray, gray, gray]);
            }
        }
        textured(SOIL, x, y)
    }))
}

/// Detector that always reports the same geometry.
pub struct FixedDetector(pub ReferenceObject);

impl ReferenceDetectorStrategy for FixedDetector {
    fn detect(&self, _image: &DynamicImage, _config: &DetectorConfig) -> Result<ReferenceObject, DetectionError> {
        Ok(self.0.clone())
    }
}

/// Detector that never finds anything.
pub struct BlindDetector;

impl ReferenceDetectorStrategy for BlindDetector {
    fn detect(&self, _image: &DynamicImage, _config: &DetectorConfig) -> Result<ReferenceObject, DetectionError> {
        Err(DetectionError::NoCandidate { candidates: 0 })
    }
}

/// Vertical reference from `(x, top)` covering `length` pixels.
pub fn vertical_reference(x: f32, top: f32, length: f32, width: f32, confidence: f32) -> ReferenceObject {
    ReferenceObject {
        top: PixelPoint::new(x, top),
        bottom: PixelPoint::new(x, top + length - 1.0),
        pixel_length: length,
        orientation_deg: 0.0,
        pixel_width: width,
        confidence,
    }
}

pub fn measurement(source_id: &str, depth_mm: f32, confidence: f32) -> Measurement {
    Measurement {
        source_id: source_id.to_string(),
        depth_mm,
        raw_depth_mm: depth_mm,
        exposed_length_mm: depth_mm,
        confidence,
        notes: Vec::new(),
    }
}

/// A successful outcome carrying only the fields aggregation looks at.
pub fn assessed(source_id: &str, depth_mm: f32, confidence: f32) -> ImageOutcome {
    assessed_with_notes(source_id, depth_mm, confidence, Vec::new())
}

pub fn assessed_with_notes(
    source_id: &str,
    depth_mm: f32,
    confidence: f32,
    notes: Vec<QualityWarning>,
) -> ImageOutcome {
    let tier = RiskTier::from_depth(depth_mm);
    let mut m = measurement(source_id, depth_mm, confidence);
    m.notes = notes.clone();
    ImageOutcome::Assessed(Box::new(ImageAssessment {
        reference: vertical_reference(100.0, 0.0, 300.0, 8.0, confidence),
        calibration: CalibrationResult {
            pixels_per_mm: 1.0,
            physical_length_mm: 300.0,
        },
        soil_line: SoilLine {
            offset_px: depth_mm,
            position: PixelPoint::new(100.0, depth_mm),
            quality: confidence,
            low_quality: false,
        },
        measurement: m,
        tier,
        recommendation: recommend(tier),
        warnings: notes,
    }))
}

pub fn failed(source_id: &str, kind: FailureKind) -> ImageOutcome {
    ImageOutcome::Failed(ImageFailure {
        source_id: source_id.to_string(),
        kind,
        message: format!("{:?}", kind),
    })
}
