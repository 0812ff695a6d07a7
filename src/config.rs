//! Analysis configuration.
//!
//! Every per-image computation receives its configuration explicitly. A config
//! is layered as: built-in defaults, then an optional TOML file, then the
//! per-location overrides it lists, then per-image overrides from the caller.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Top-level configuration for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Physical length of the reference pin in millimeters.
    pub reference_physical_length_mm: f32,
    /// Exposed length recorded when the pin was installed.
    pub baseline_exposed_length_mm: f32,
    /// Terrain gradient in percent, used for hedgerow spacing when known.
    pub slope_percent: Option<f32>,
    pub detector: DetectorConfig,
    pub soil_line: SoilLineConfig,
    pub aggregation: AggregationConfig,
    /// Overrides keyed by location id.
    pub locations: BTreeMap<String, SiteOverrides>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            reference_physical_length_mm: 300.0,
            baseline_exposed_length_mm: 0.0,
            slope_percent: None,
            detector: DetectorConfig::default(),
            soil_line: SoilLineConfig::default(),
            aggregation: AggregationConfig::default(),
            locations: BTreeMap::new(),
        }
    }
}

/// Reference detector tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum visible pin length in pixels; shorter candidates are rejected.
    pub min_detection_pixel_length: f32,
    pub min_aspect_ratio: f32,
    /// Mean width over perpendicular extent, 1.0 for a perfectly straight bar.
    pub min_straightness: f32,
    pub min_confidence: f32,
    /// Detections below this confidence still succeed but carry a warning.
    pub warn_below_confidence: f32,
    pub blur_sigma: f32,
    /// Median filter radius for the background estimate. Must exceed the pin width.
    pub background_radius: u32,
    /// Gray-level difference from the background that counts as foreground.
    pub contrast_threshold: f32,
    pub closing_radius: u8,
    pub min_fragment_pixels: u32,
    pub max_merge_angle_deg: f32,
    pub max_occlusion_gap_px: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_detection_pixel_length: 50.0,
            min_aspect_ratio: 4.0,
            min_straightness: 0.3,
            min_confidence: 0.2,
            warn_below_confidence: 0.5,
            blur_sigma: 1.5,
            background_radius: 15,
            contrast_threshold: 40.0,
            closing_radius: 2,
            min_fragment_pixels: 20,
            max_merge_angle_deg: 5.0,
            max_occlusion_gap_px: 40.0,
        }
    }
}

/// Soil-line locator tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilLineConfig {
    /// Consecutive samples past the threshold needed to accept a transition.
    pub transition_run_length: usize,
    pub transition_threshold: f32,
    pub strip_half_width: u32,
    /// Share of the axis, from the top, used as the exposed-pin signature.
    pub reference_fraction: f32,
    pub texture_weight: f32,
    pub low_quality_threshold: f32,
}

impl Default for SoilLineConfig {
    fn default() -> Self {
        Self {
            transition_run_length: 5,
            transition_threshold: 30.0,
            strip_half_width: 2,
            reference_fraction: 0.1,
            texture_weight: 0.5,
            low_quality_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Measurements below this confidence are left out of a location's mean.
    pub quality_floor: f32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self { quality_floor: 0.5 }
    }
}

/// Per-site or per-image replacement of the calibration defaults and slope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteOverrides {
    pub reference_physical_length_mm: Option<f32>,
    pub baseline_exposed_length_mm: Option<f32>,
    pub slope_percent: Option<f32>,
}

impl AnalysisConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AnalysisConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading config file {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Replace values that are set in `overrides`.
    pub fn apply_overrides(&mut self, overrides: &SiteOverrides) {
        if let Some(length) = overrides.reference_physical_length_mm {
            self.reference_physical_length_mm = length;
        }
        if let Some(baseline) = overrides.baseline_exposed_length_mm {
            self.baseline_exposed_length_mm = baseline;
        }
        if let Some(slope) = overrides.slope_percent {
            self.slope_percent = Some(slope);
        }
    }

    /// Effective config for one image of `location_id`.
    ///
    /// The merged result is validated, so per-image overrides are held to the
    /// same rules as a config file.
    pub fn resolve_for(
        &self,
        location_id: &str,
        image_overrides: Option<&SiteOverrides>,
    ) -> Result<AnalysisConfig, ConfigError> {
        let mut resolved = self.clone();
        if let Some(site) = self.locations.get(location_id) {
            resolved.apply_overrides(site);
        }
        if let Some(image) = image_overrides {
            resolved.apply_overrides(image);
        }
        resolved.validate()?;
        Ok(resolved)
    }

    /// Terrain gradient for `location_id`: its own override, else the site-wide value.
    pub fn slope_for(&self, location_id: &str) -> Option<f32> {
        self.locations
            .get(location_id)
            .and_then(|site| site.slope_percent)
            .or(self.slope_percent)
    }

    /// Check that all values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("reference_physical_length_mm", self.reference_physical_length_mm)?;
        non_negative("baseline_exposed_length_mm", self.baseline_exposed_length_mm)?;

        let d = &self.detector;
        positive("detector.min_detection_pixel_length", d.min_detection_pixel_length)?;
        positive("detector.min_aspect_ratio", d.min_aspect_ratio)?;
        unit_range("detector.min_straightness", d.min_straightness)?;
        unit_range("detector.min_confidence", d.min_confidence)?;
        unit_range("detector.warn_below_confidence", d.warn_below_confidence)?;
        non_negative("detector.blur_sigma", d.blur_sigma)?;
        positive("detector.contrast_threshold", d.contrast_threshold)?;
        non_negative("detector.max_merge_angle_deg", d.max_merge_angle_deg)?;
        non_negative("detector.max_occlusion_gap_px", d.max_occlusion_gap_px)?;
        if d.background_radius == 0 {
            return Err(invalid("detector.background_radius", "must be at least 1"));
        }

        let s = &self.soil_line;
        if s.transition_run_length == 0 {
            return Err(invalid("soil_line.transition_run_length", "must be at least 1"));
        }
        positive("soil_line.transition_threshold", s.transition_threshold)?;
        unit_range("soil_line.reference_fraction", s.reference_fraction)?;
        non_negative("soil_line.texture_weight", s.texture_weight)?;
        unit_range("soil_line.low_quality_threshold", s.low_quality_threshold)?;

        unit_range("aggregation.quality_floor", self.aggregation.quality_floor)?;

        for overrides in self.locations.values() {
            if let Some(length) = overrides.reference_physical_length_mm {
                positive("locations.reference_physical_length_mm", length)?;
            }
            if let Some(baseline) = overrides.baseline_exposed_length_mm {
                non_negative("locations.baseline_exposed_length_mm", baseline)?;
            }
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be positive, got {value}")))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be zero or positive, got {value}")))
    }
}

fn unit_range(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be 0.0-1.0, got {value}")))
    }
}
