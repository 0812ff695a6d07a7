pub mod preprocessing;
pub mod contours;
pub mod lines;

use image::DynamicImage;
use tracing::debug;

use crate::config::DetectorConfig;
use crate::error::DetectionError;
use crate::models::ReferenceObject;
use lines::Candidate;

/// Strategy for locating the graduated reference pin in a photo.
///
/// Implementations must be pure: the same image and config always give the
/// same answer, and nothing is shared between calls.
pub trait ReferenceDetectorStrategy: Send + Sync {
    fn detect(&self, image: &DynamicImage, config: &DetectorConfig) -> Result<ReferenceObject, DetectionError>;
}

/// Classical detector: contrast segmentation against a median background,
/// then principal-axis line fitting of elongated regions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContrastLineDetector;

impl ContrastLineDetector {
    pub fn new() -> Self {
        Self
    }

    /// All fitted candidates, best first, before the qualification filter (for diagnostics)
    pub fn candidates(&self, image: &DynamicImage, config: &DetectorConfig) -> Vec<Candidate> {
        let gray = preprocessing::to_grayscale(image);
        let blurred = preprocessing::apply_blur(&gray, config.blur_sigma);
        let background = preprocessing::estimate_background(&blurred, config.background_radius);
        let contrast = preprocessing::contrast_map(&blurred, &background);
        let mask = preprocessing::threshold_mask(&contrast, config.contrast_threshold);
        let mask = preprocessing::close_gaps(&mask, config.closing_radius);

        let regions = contours::find_contours(&mask, &contrast, config.min_fragment_pixels);
        debug!("Found {} foreground regions", regions.len());

        let mut candidates = lines::build_candidates(&regions, config);
        candidates.sort_by(lines::rank);
        candidates
    }
}

impl ReferenceDetectorStrategy for ContrastLineDetector {
    fn detect(&self, image: &DynamicImage, config: &DetectorConfig) -> Result<ReferenceObject, DetectionError> {
        let candidates = self.candidates(image, config);
        let examined = candidates.len();

        if tracing::enabled!(tracing::Level::DEBUG) {
            for (i, c) in candidates.iter().take(5).enumerate() {
                debug!(
                    "  Candidate {}: length={:.1}, aspect={:.2}, straightness={:.2}, contrast={:.1}, coverage={:.2}",
                    i + 1, c.fit.length(), c.fit.aspect_ratio(), c.fit.straightness(),
                    c.fit.mean_contrast, c.fit.coverage()
                );
            }
        }

        let best = candidates
            .into_iter()
            .find(|c| c.qualifies(config))
            .ok_or(DetectionError::NoCandidate { candidates: examined })?;

        let confidence = best.confidence(config);
        if confidence < config.min_confidence {
            return Err(DetectionError::LowConfidence {
                confidence,
                floor: config.min_confidence,
            });
        }

        let reference = best.to_reference(image.width(), image.height(), confidence);
        debug!(
            "Reference pin: ({:.1}, {:.1}) -> ({:.1}, {:.1}), {:.1}px, {:.1} deg, confidence {:.2}",
            reference.top.x, reference.top.y, reference.bottom.x, reference.bottom.y,
            reference.pixel_length, reference.orientation_deg, reference.confidence
        );
        Ok(reference)
    }
}
