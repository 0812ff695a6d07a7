use crate::calibration;
use crate::detection::ReferenceDetectorStrategy;
use crate::error::AnalysisError;
use crate::estimation;
use crate::models::QualityWarning;
use crate::pipeline::{require, PipelineContext, PipelineData, PipelineStep};
use crate::recommendation::{self, SlopeContext};
use crate::risk::RiskTier;
use crate::soil_line;
use std::sync::Arc;

/// Locate the reference pin with a pluggable detector
pub struct ReferenceDetectionStep {
    pub detector: Arc<dyn ReferenceDetectorStrategy>,
}

impl PipelineStep for ReferenceDetectionStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData, AnalysisError> {
        let detector_config = &context.config.detector;
        let reference = self.detector.detect(&data.image, detector_config)?;
        if reference.confidence < detector_config.warn_below_confidence {
            data.warn(QualityWarning::LowDetectionConfidence);
        }
        data.reference = Some(reference);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Reference Detection"
    }
}

/// Convert the reference's pixel length into a pixels-per-mm ratio
pub struct ScaleCalibrationStep;

impl PipelineStep for ScaleCalibrationStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData, AnalysisError> {
        let reference = require(&data.reference, self.name(), "reference")?;
        let calibration = calibration::calibrate_reference(
            reference,
            context.config.reference_physical_length_mm,
        )?;
        data.calibration = Some(calibration);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Scale Calibration"
    }
}

/// Find where the exposed pin meets the soil
pub struct SoilLineStep;

impl PipelineStep for SoilLineStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData, AnalysisError> {
        let reference = require(&data.reference, self.name(), "reference")?;
        let soil_line = soil_line::locate_soil_line(&data.image, reference, &context.config.soil_line)?;
        if soil_line.low_quality {
            data.warn(QualityWarning::LowSoilLineQuality);
        }
        data.soil_line = Some(soil_line);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Soil Line"
    }
}

/// Turn exposed length and scale into an erosion depth
pub struct ErosionEstimationStep;

impl PipelineStep for ErosionEstimationStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData, AnalysisError> {
        let name = self.name();
        let reference = require(&data.reference, name, "reference")?;
        let soil_line = require(&data.soil_line, name, "soil line")?;
        let calibration = require(&data.calibration, name, "calibration")?;

        let measurement = estimation::estimate_erosion(
            &data.source_id,
            reference,
            soil_line,
            calibration,
            context.config.baseline_exposed_length_mm,
        );
        for note in measurement.notes.clone() {
            data.warn(note);
        }
        data.measurement = Some(measurement);
        Ok(data)
    }

    fn name(&self) -> &str {
        "Erosion Estimation"
    }
}

/// Classify the measured depth
pub struct RiskClassificationStep;

impl PipelineStep for RiskClassificationStep {
    fn process(&self, mut data: PipelineData, _context: &PipelineContext) -> Result<PipelineData, AnalysisError> {
        let measurement = require(&data.measurement, self.name(), "measurement")?;
        data.tier = Some(RiskTier::from_depth(measurement.depth_mm));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Risk Classification"
    }
}

/// Attach the mitigation plan for the tier
pub struct RecommendationStep;

impl PipelineStep for RecommendationStep {
    fn process(&self, mut data: PipelineData, context: &PipelineContext) -> Result<PipelineData, AnalysisError> {
        let tier = *require(&data.tier, self.name(), "risk tier")?;
        let slope = context.config.slope_percent.map(|gradient_percent| SlopeContext { gradient_percent });
        data.recommendation = Some(recommendation::recommend_with_slope(tier, slope.as_ref()));
        Ok(data)
    }

    fn name(&self) -> &str {
        "Recommendation"
    }
}
