//! Per-image analysis, per-location aggregation and batch processing.
//!
//! Stage failures never escape this module as errors: every photo ends as an
//! [`ImageOutcome`], so one unusable photo cannot spoil a site report.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, SiteOverrides};
use crate::detection::{ContrastLineDetector, ReferenceDetectorStrategy};
use crate::error::{AnalysisError, FailureKind};
use crate::models::{CalibrationResult, Measurement, QualityWarning, ReferenceObject, SoilLine};
use crate::pipeline::{Pipeline, PipelineContext, PipelineData};
use crate::recommendation::{recommend_with_slope, Recommendation, SlopeContext};
use crate::report::{build_site_summary, SiteSummary};
use crate::risk::RiskTier;

/// One decoded photo and where it was taken.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub source_id: String,
    pub location_id: String,
    pub image: Arc<DynamicImage>,
    pub overrides: Option<SiteOverrides>,
}

impl ImageInput {
    pub fn new(source_id: impl Into<String>, location_id: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            source_id: source_id.into(),
            location_id: location_id.into(),
            image: Arc::new(image),
            overrides: None,
        }
    }

    pub fn with_overrides(mut self, overrides: SiteOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

/// Full result for a successfully analysed photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAssessment {
    pub reference: ReferenceObject,
    pub calibration: CalibrationResult,
    pub soil_line: SoilLine,
    pub measurement: Measurement,
    pub tier: RiskTier,
    pub recommendation: Recommendation,
    pub warnings: Vec<QualityWarning>,
}

impl ImageAssessment {
    fn from_pipeline(data: PipelineData) -> Result<Self, AnalysisError> {
        let missing = |what: &'static str| AnalysisError::MissingStageOutput {
            step: "assessment".to_string(),
            missing: what,
        };
        Ok(Self {
            reference: data.reference.ok_or_else(|| missing("reference"))?,
            calibration: data.calibration.ok_or_else(|| missing("calibration"))?,
            soil_line: data.soil_line.ok_or_else(|| missing("soil line"))?,
            measurement: data.measurement.ok_or_else(|| missing("measurement"))?,
            tier: data.tier.ok_or_else(|| missing("risk tier"))?,
            recommendation: data.recommendation.ok_or_else(|| missing("recommendation"))?,
            warnings: data.warnings,
        })
    }
}

/// Why a photo produced no measurement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ImageFailure {
    pub source_id: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ImageFailure {
    pub fn from_error(source_id: &str, error: &AnalysisError) -> Self {
        Self {
            source_id: source_id.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    Assessed(Box<ImageAssessment>),
    Failed(ImageFailure),
}

impl ImageOutcome {
    pub fn source_id(&self) -> &str {
        match self {
            ImageOutcome::Assessed(a) => &a.measurement.source_id,
            ImageOutcome::Failed(f) => &f.source_id,
        }
    }

    pub fn measurement(&self) -> Option<&Measurement> {
        match self {
            ImageOutcome::Assessed(a) => Some(&a.measurement),
            ImageOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ImageFailure> {
        match self {
            ImageOutcome::Assessed(_) => None,
            ImageOutcome::Failed(f) => Some(f),
        }
    }
}

/// How a location's depth was derived from its measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    /// Mean of every measurement at or above the quality floor.
    MeanAboveFloor,
    /// Nothing cleared the floor; the single best measurement was used.
    BestBelowFloor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationAssessment {
    pub depth_mm: f32,
    pub tier: RiskTier,
    pub recommendation: Recommendation,
    /// Mean confidence of the measurements used.
    pub confidence: f32,
    pub method: AggregationMethod,
    pub samples_used: usize,
    pub warnings: Vec<QualityWarning>,
}

/// Aggregated state of one physical measurement site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationResult {
    pub location_id: String,
    /// Absent when no photo of the location could be measured.
    pub assessment: Option<LocationAssessment>,
    /// All measurements, best first.
    pub measurements: Vec<Measurement>,
    /// Photos that failed, ordered by source id.
    pub failures: Vec<ImageFailure>,
    /// Measurements left out because they fell below the quality floor.
    pub below_floor_count: usize,
}

impl LocationResult {
    pub fn tier(&self) -> Option<RiskTier> {
        self.assessment.as_ref().map(|a| a.tier)
    }

    pub fn image_count(&self) -> usize {
        self.measurements.len() + self.failures.len()
    }
}

/// Best-first order: confidence, then depth (the more cautious reading), then source id.
/// Remaining fields break ties, so only identical measurements compare equal.
fn canonical_order(a: &Measurement, b: &Measurement) -> Ordering {
    b.confidence.total_cmp(&a.confidence)
        .then_with(|| b.depth_mm.total_cmp(&a.depth_mm))
        .then_with(|| a.source_id.cmp(&b.source_id))
        .then_with(|| a.raw_depth_mm.total_cmp(&b.raw_depth_mm))
        .then_with(|| a.exposed_length_mm.total_cmp(&b.exposed_length_mm))
        .then_with(|| a.notes.cmp(&b.notes))
}

/// Combine the outcomes of one location's photos.
///
/// The rule is order independent: measurements are sorted into a canonical
/// order before anything is summed, so any permutation of `outcomes` gives an
/// identical result.
pub fn aggregate_location(outcomes: &[ImageOutcome], location_id: &str, config: &AnalysisConfig) -> LocationResult {
    let mut measurements: Vec<Measurement> = outcomes.iter()
        .filter_map(|o| o.measurement().cloned())
        .collect();
    measurements.sort_by(canonical_order);

    let mut failures: Vec<ImageFailure> = outcomes.iter()
        .filter_map(|o| o.failure().cloned())
        .collect();
    failures.sort();

    let floor = config.aggregation.quality_floor;
    let accepted: Vec<&Measurement> = measurements.iter()
        .filter(|m| m.confidence >= floor)
        .collect();
    let below_floor_count = measurements.len() - accepted.len();

    let (used, method): (Vec<&Measurement>, AggregationMethod) = if !accepted.is_empty() {
        (accepted, AggregationMethod::MeanAboveFloor)
    } else {
        (measurements.iter().take(1).collect(), AggregationMethod::BestBelowFloor)
    };

    let assessment = if used.is_empty() {
        warn!("{}: no usable measurements ({} failed photos)", location_id, failures.len());
        None
    } else {
        let n = used.len() as f32;
        let depth_mm = used.iter().map(|m| m.depth_mm).sum::<f32>() / n;
        let confidence = used.iter().map(|m| m.confidence).sum::<f32>() / n;
        let tier = RiskTier::from_depth(depth_mm);

        let slope = config.slope_for(location_id).map(|gradient_percent| SlopeContext { gradient_percent });
        let recommendation = recommend_with_slope(tier, slope.as_ref());

        let warnings: BTreeSet<QualityWarning> = used.iter()
            .flat_map(|m| m.notes.iter().copied())
            .collect();
        if method == AggregationMethod::BestBelowFloor {
            warn!(
                "{}: no measurement reached the quality floor {:.2}, using best ({:.2})",
                location_id, floor, confidence
            );
        }

        debug!(
            "{}: {:.1}mm from {} of {} measurements ({:?}) -> {}",
            location_id, depth_mm, used.len(), measurements.len(), method, tier
        );

        Some(LocationAssessment {
            depth_mm,
            tier,
            recommendation,
            confidence,
            method,
            samples_used: used.len(),
            warnings: warnings.into_iter().collect(),
        })
    };

    LocationResult {
        location_id: location_id.to_string(),
        assessment,
        measurements,
        failures,
        below_floor_count,
    }
}

/// Runs the per-image pipeline and builds site reports.
#[derive(Clone)]
pub struct Orchestrator {
    config: AnalysisConfig,
    pipeline: Pipeline,
}

impl Orchestrator {
    /// Orchestrator using the classical contrast/line detector.
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_detector(config, Arc::new(ContrastLineDetector::new()))
    }

    /// Orchestrator using a caller-supplied reference detector.
    pub fn with_detector(config: AnalysisConfig, detector: Arc<dyn ReferenceDetectorStrategy>) -> Self {
        Self {
            config,
            pipeline: Pipeline::standard(detector),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse one photo. Failures come back as [`ImageOutcome::Failed`].
    pub fn analyze_image(&self, input: &ImageInput) -> ImageOutcome {
        let result = self.config
            .resolve_for(&input.location_id, input.overrides.as_ref())
            .map_err(|e| AnalysisError::InvalidConfig(e.to_string()))
            .and_then(|config| {
                let context = PipelineContext { config };
                let data = PipelineData::new(input.source_id.clone(), Arc::clone(&input.image));
                self.pipeline.run(data, &context)
            })
            .and_then(ImageAssessment::from_pipeline);

        match result {
            Ok(assessment) => {
                debug!(
                    "{}: {:.1}mm erosion, {} risk",
                    input.source_id, assessment.measurement.depth_mm, assessment.tier
                );
                ImageOutcome::Assessed(Box::new(assessment))
            }
            Err(e) => {
                warn!("{}: {}", input.source_id, e);
                ImageOutcome::Failed(ImageFailure::from_error(&input.source_id, &e))
            }
        }
    }

    /// Analyse one location's photos and aggregate them.
    pub fn analyze_location(&self, location_id: &str, inputs: &[ImageInput]) -> LocationResult {
        let outcomes: Vec<ImageOutcome> = inputs.par_iter()
            .map(|input| self.analyze_image(input))
            .collect();
        aggregate_location(&outcomes, location_id, &self.config)
    }

    /// Analyse all photos in parallel. Each outcome is paired with its location id.
    pub fn analyze_all(&self, inputs: &[ImageInput]) -> Vec<(String, ImageOutcome)> {
        info!("Analysing {} photos", inputs.len());
        inputs.par_iter()
            .map(|input| (input.location_id.clone(), self.analyze_image(input)))
            .collect()
    }

    /// Analyse all photos in parallel, then group by location and summarise.
    pub fn analyze_batch(&self, inputs: &[ImageInput]) -> SiteSummary {
        self.summarize(self.analyze_all(inputs))
    }

    /// Group finished outcomes by location and build the site summary.
    ///
    /// Runs only once every outcome is in, so the result does not depend on
    /// the order in which photos finished.
    pub fn summarize(&self, outcomes: Vec<(String, ImageOutcome)>) -> SiteSummary {
        let mut by_location: BTreeMap<String, Vec<ImageOutcome>> = BTreeMap::new();
        for (location_id, outcome) in outcomes {
            by_location.entry(location_id).or_default().push(outcome);
        }

        let results: Vec<LocationResult> = by_location.iter()
            .map(|(location_id, outcomes)| aggregate_location(outcomes, location_id, &self.config))
            .collect();

        let summary = build_site_summary(results);
        info!(
            "{} locations: {} high, {} medium, {} low, {} unassessed; {} photos unprocessed",
            summary.locations.len(),
            summary.tier_counts.high,
            summary.tier_counts.medium,
            summary.tier_counts.low,
            summary.unassessed_locations,
            summary.images_unprocessed
        );
        summary
    }
}

/// Analyse a single photo with the default detector.
pub fn analyze_image(source_id: &str, image: &DynamicImage, config: &AnalysisConfig) -> ImageOutcome {
    let orchestrator = Orchestrator::new(config.clone());
    let input = ImageInput {
        source_id: source_id.to_string(),
        location_id: String::new(),
        image: Arc::new(image.clone()),
        overrides: None,
    };
    orchestrator.analyze_image(&input)
}

/// Location id for a photo file name.
///
/// A `location` token followed by a number (`location_3.jpg`, `Location-03b.png`)
/// gives `location-3`; anything else falls back to the file stem.
pub fn location_id_from_filename(filename: &str) -> String {
    let lower = filename.to_lowercase();
    if let Some(pos) = lower.find("location") {
        let rest = &lower[pos + "location".len()..];
        let digits: String = rest
            .trim_start_matches(|c: char| c == '_' || c == '-' || c == ' ')
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(n) = digits.parse::<u64>() {
            return format!("location-{}", n);
        }
    }

    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}
