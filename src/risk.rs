use std::fmt;

use serde::{Deserialize, Serialize};

/// Depths below this are low risk.
pub const MEDIUM_THRESHOLD_MM: f32 = 5.0;
/// Depths above this are high risk.
pub const HIGH_THRESHOLD_MM: f32 = 15.0;

/// Severity of measured erosion. Always derived from a depth, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Classify an erosion depth: below 5mm is Low, 5 to 15mm inclusive is Medium, above is High.
    pub fn from_depth(depth_mm: f32) -> RiskTier {
        if depth_mm < MEDIUM_THRESHOLD_MM {
            RiskTier::Low
        } else if depth_mm <= HIGH_THRESHOLD_MM {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-function form of [`RiskTier::from_depth`].
pub fn classify(depth_mm: f32) -> RiskTier {
    RiskTier::from_depth(depth_mm)
}
