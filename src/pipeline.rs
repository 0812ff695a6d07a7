use image::DynamicImage;
use std::sync::Arc;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::detection::{ContrastLineDetector, ReferenceDetectorStrategy};
use crate::error::AnalysisError;
use crate::models::{CalibrationResult, Measurement, QualityWarning, ReferenceObject, SoilLine};
use crate::recommendation::Recommendation;
use crate::risk::RiskTier;
use crate::steps::*;

/// Data that flows through the pipeline for a single photo.
/// Each step fills in the result of its stage.
#[derive(Clone)]
pub struct PipelineData {
    pub source_id: String,

    /// The decoded photo (shared, never modified)
    pub image: Arc<DynamicImage>,

    pub reference: Option<ReferenceObject>,
    pub calibration: Option<CalibrationResult>,
    pub soil_line: Option<SoilLine>,
    pub measurement: Option<Measurement>,
    pub tier: Option<RiskTier>,
    pub recommendation: Option<Recommendation>,

    /// Non-fatal findings collected along the way
    pub warnings: Vec<QualityWarning>,
}

impl PipelineData {
    pub fn new(source_id: impl Into<String>, image: Arc<DynamicImage>) -> Self {
        Self {
            source_id: source_id.into(),
            image,
            reference: None,
            calibration: None,
            soil_line: None,
            measurement: None,
            tier: None,
            recommendation: None,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, warning: QualityWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

/// Fetch a stage output or report which step needed it.
pub(crate) fn require<'a, T>(value: &'a Option<T>, step: &str, missing: &'static str) -> Result<&'a T, AnalysisError> {
    value.as_ref().ok_or_else(|| AnalysisError::MissingStageOutput {
        step: step.to_string(),
        missing,
    })
}

/// Context available to all pipeline steps
#[derive(Clone)]
pub struct PipelineContext {
    pub config: AnalysisConfig,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Fill in this step's stage of the analysis
    fn process(&self, data: PipelineData, context: &PipelineContext) -> Result<PipelineData, AnalysisError>;

    /// Human-readable name for this step (used in log output)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
#[derive(Clone)]
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// The full erosion pipeline using the given reference detector
    pub fn standard(detector: Arc<dyn ReferenceDetectorStrategy>) -> Self {
        Pipeline::new()
            .add_step(Arc::new(ReferenceDetectionStep { detector }))
            .add_step(Arc::new(ScaleCalibrationStep))
            .add_step(Arc::new(SoilLineStep))
            .add_step(Arc::new(ErosionEstimationStep))
            .add_step(Arc::new(RiskClassificationStep))
            .add_step(Arc::new(RecommendationStep))
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step on one photo, stopping at the first failing stage
    pub fn run(&self, data: PipelineData, context: &PipelineContext) -> Result<PipelineData, AnalysisError> {
        self.run_partial(data, context, self.steps.len())
    }

    /// Run only the first `num_steps` steps (useful for debugging)
    pub fn run_partial(
        &self,
        mut data: PipelineData,
        context: &PipelineContext,
        num_steps: usize,
    ) -> Result<PipelineData, AnalysisError> {
        let (width, height) = (data.image.width(), data.image.height());
        if width == 0 || height == 0 {
            return Err(AnalysisError::InvalidImage(format!(
                "{} has no pixels ({}x{})",
                data.source_id, width, height
            )));
        }

        for (i, step) in self.steps.iter().take(num_steps).enumerate() {
            debug!("{}: step {} {}", data.source_id, i + 1, step.name());
            data = step.process(data, context)?;
        }

        Ok(data)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard(Arc::new(ContrastLineDetector::new()))
    }
}
