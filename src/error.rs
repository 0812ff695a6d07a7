use serde::{Deserialize, Serialize};

/// The reference pin could not be located.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectionError {
    #[error("no elongated high-contrast region found ({candidates} regions examined)")]
    NoCandidate { candidates: usize },

    #[error("best reference candidate confidence {confidence:.2} is below the floor {floor:.2}")]
    LowConfidence { confidence: f32, floor: f32 },
}

/// The pixel-to-millimeter scale could not be derived.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("reference pixel length {0} is too small to calibrate")]
    DegeneratePixelLength(f32),

    #[error("physical reference length must be positive, got {0} mm")]
    InvalidPhysicalLength(f32),
}

/// No exposed/buried boundary was found along the reference axis.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SoilLineError {
    #[error("reference axis too short to sample ({samples} samples, need {required})")]
    TooFewSamples { samples: usize, required: usize },

    #[error("no sustained transition of {run_length} samples found along the reference axis")]
    NoTransition { run_length: usize },

    #[error("top {window} samples of the reference do not match each other; exposed section too short to measure")]
    NonUniformTop { window: usize },
}

/// Any stage failure of a single-image analysis.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Detection(#[from] DetectionError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    SoilLine(#[from] SoilLineError),

    #[error("unusable image: {0}")]
    InvalidImage(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("step '{step}' ran before '{missing}' was available")]
    MissingStageOutput { step: String, missing: &'static str },
}

impl AnalysisError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AnalysisError::Detection(_) => FailureKind::Detection,
            AnalysisError::Calibration(_) => FailureKind::Calibration,
            AnalysisError::SoilLine(_) => FailureKind::SoilLineNotFound,
            AnalysisError::InvalidImage(_) => FailureKind::InvalidImage,
            AnalysisError::InvalidConfig(_) => FailureKind::InvalidConfig,
            AnalysisError::MissingStageOutput { .. } => FailureKind::Internal,
        }
    }
}

/// Serializable classification of a per-image failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Detection,
    Calibration,
    SoilLineNotFound,
    InvalidImage,
    InvalidConfig,
    Internal,
}

/// Rejected configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
