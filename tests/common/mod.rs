#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from erosionwatch for tests
pub use erosionwatch::{
    AnalysisConfig, ImageInput, ImageOutcome, LocationResult, Orchestrator, RiskTier, Timeline,
};

/// Config for the default [`PinPhoto`]: a 240mm pin, so one pixel is one millimeter.
pub fn photo_config() -> AnalysisConfig {
    AnalysisConfig {
        reference_physical_length_mm: 240.0,
        ..AnalysisConfig::default()
    }
}

pub fn assert_close(actual: f32, expected: f32, tolerance: f32) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {} (+/- {}), got {}",
        expected,
        tolerance,
        actual
    );
}
