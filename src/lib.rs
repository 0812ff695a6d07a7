pub mod calibration;
pub mod config;
pub mod detection;
pub mod error;
pub mod estimation;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod recommendation;
pub mod report;
pub mod risk;
pub mod soil_line;
pub mod steps;

pub use config::{AggregationConfig, AnalysisConfig, DetectorConfig, SiteOverrides, SoilLineConfig};
pub use detection::{ContrastLineDetector, ReferenceDetectorStrategy};
pub use error::{AnalysisError, CalibrationError, ConfigError, DetectionError, FailureKind, SoilLineError};
pub use models::{CalibrationResult, Measurement, PixelPoint, QualityWarning, ReferenceObject, SoilLine};
pub use orchestrator::{
    aggregate_location, analyze_image, location_id_from_filename,
    AggregationMethod, ImageAssessment, ImageFailure, ImageInput, ImageOutcome,
    LocationAssessment, LocationResult, Orchestrator,
};
pub use pipeline::{Pipeline, PipelineContext, PipelineData, PipelineStep};
pub use recommendation::{recommend, recommend_with_slope, Recommendation, SlopeContext, Timeline};
pub use report::{build_site_summary, SiteReport, SiteSummary};
pub use risk::{classify, RiskTier};
