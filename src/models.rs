use serde::{Deserialize, Serialize};

/// A connected foreground region of the contrast mask.
#[derive(Debug, Clone)]
pub struct Contour {
    pub label: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    /// Pixel coordinates belonging to the region.
    pub points: Vec<(u32, u32)>,
    /// Sum of absolute background differences over the region.
    pub contrast_sum: f32,
}

impl Contour {
    pub fn area(&self) -> u32 {
        self.points.len() as u32
    }

    /// Mean absolute difference from the estimated background.
    pub fn mean_contrast(&self) -> f32 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.contrast_sum / self.points.len() as f32
    }
}

/// A position in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

impl PixelPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &PixelPoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Detected geometry of the graduated reference pin.
///
/// `top` is the exposed end, `bottom` the embedded end. `pixel_length` counts
/// pixels along the axis, so the sample at offset `pixel_length - 1` sits on
/// `bottom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceObject {
    pub top: PixelPoint,
    pub bottom: PixelPoint,
    pub pixel_length: f32,
    /// Degrees from the image's downward vertical, positive towards +x.
    pub orientation_deg: f32,
    /// Mean pin width in pixels.
    pub pixel_width: f32,
    pub confidence: f32,
}

impl ReferenceObject {
    /// Unit vector pointing from `top` to `bottom`.
    pub fn axis(&self) -> (f32, f32) {
        let dx = self.bottom.x - self.top.x;
        let dy = self.bottom.y - self.top.y;
        let norm = (dx * dx + dy * dy).sqrt();
        if norm <= f32::EPSILON {
            (0.0, 1.0)
        } else {
            (dx / norm, dy / norm)
        }
    }

    /// Point at `offset` pixels from `top` along the axis.
    pub fn point_at(&self, offset: f32) -> PixelPoint {
        let (ax, ay) = self.axis();
        PixelPoint::new(self.top.x + ax * offset, self.top.y + ay * offset)
    }
}

/// Pixels-per-millimeter scale derived from the reference object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub pixels_per_mm: f32,
    pub physical_length_mm: f32,
}

impl CalibrationResult {
    pub fn to_mm(&self, pixels: f32) -> f32 {
        pixels / self.pixels_per_mm
    }

    pub fn to_pixels(&self, mm: f32) -> f32 {
        mm * self.pixels_per_mm
    }
}

/// Boundary between exposed and buried pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilLine {
    /// Exposed pixel length, measured from the reference's top end.
    pub offset_px: f32,
    pub position: PixelPoint,
    pub quality: f32,
    /// Set when quality is below the configured threshold.
    pub low_quality: bool,
}

/// Non-fatal findings attached to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityWarning {
    LowDetectionConfidence,
    LowSoilLineQuality,
    /// Soil sits above the installation baseline; depth was clamped to zero.
    Accretion,
}

/// Erosion measured from a single photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub source_id: String,
    /// Net soil loss, never negative.
    pub depth_mm: f32,
    /// Unclamped exposed length minus baseline.
    pub raw_depth_mm: f32,
    pub exposed_length_mm: f32,
    pub confidence: f32,
    pub notes: Vec<QualityWarning>,
}
