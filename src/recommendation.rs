//! Mitigation plans per risk tier.
//!
//! Plans are structured data; wording and locale belong to whoever renders them.

use serde::{Deserialize, Serialize};

use crate::risk::RiskTier;

/// Vetiver slip spacing along a contour hedgerow.
pub const HEDGEROW_SLIP_SPACING_CM: u32 = 10;
/// Hedge placement upslope of the measured pin, in meters.
pub const UPSLOPE_OFFSET_M: (f32, f32) = (2.0, 3.0);
/// Vertical drop between successive hedgerows on a slope.
pub const HEDGEROW_VERTICAL_INTERVAL_M: f32 = 1.0;
/// Longest hedgerow interval recommended on very gentle slopes.
pub const MAX_HEDGEROW_INTERVAL_M: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeSpecies {
    Vetiver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Action {
    ContinueMonitoring,
    ContourHedgerow { species: HedgeSpecies },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Spacing {
    SlipSpacing { cm: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    Monitor,
    Planned,
    Urgent,
}

impl Timeline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeline::Monitor => "continue monitoring",
            Timeline::Planned => "planned",
            Timeline::Urgent => "urgent",
        }
    }

    /// Rough deadline in days, if the work is scheduled at all.
    pub fn approx_days(&self) -> Option<u32> {
        match self {
            Timeline::Monitor => None,
            Timeline::Planned => Some(30),
            Timeline::Urgent => Some(14),
        }
    }
}

/// Optional terrain information for the measured location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlopeContext {
    /// Rise over run, in percent.
    pub gradient_percent: f32,
}

impl SlopeContext {
    /// Surface distance between hedgerows for a fixed vertical interval.
    pub fn hedgerow_interval_m(&self) -> Option<f32> {
        if !self.gradient_percent.is_finite() || self.gradient_percent <= 0.0 {
            return None;
        }
        let run_per_rise = 100.0 / self.gradient_percent;
        let interval = HEDGEROW_VERTICAL_INTERVAL_M * (1.0 + run_per_rise * run_per_rise).sqrt();
        Some(interval.min(MAX_HEDGEROW_INTERVAL_M))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    pub spacing: Option<Spacing>,
    pub timeline: Timeline,
    /// Where to place the hedge, in meters upslope of the pin.
    pub upslope_offset_m: Option<(f32, f32)>,
    /// Surface distance between successive hedgerows, when slope is known.
    pub hedgerow_interval_m: Option<f32>,
}

/// Map a risk tier to its plan.
pub fn recommend(tier: RiskTier) -> Recommendation {
    recommend_with_slope(tier, None)
}

/// Map a risk tier to its plan, using slope context for hedgerow spacing.
/// Slope never changes the action or the timeline.
pub fn recommend_with_slope(tier: RiskTier, slope: Option<&SlopeContext>) -> Recommendation {
    let timeline = match tier {
        RiskTier::Low => Timeline::Monitor,
        RiskTier::Medium => Timeline::Planned,
        RiskTier::High => Timeline::Urgent,
    };

    if tier == RiskTier::Low {
        return Recommendation {
            action: Action::ContinueMonitoring,
            spacing: None,
            timeline,
            upslope_offset_m: None,
            hedgerow_interval_m: None,
        };
    }

    Recommendation {
        action: Action::ContourHedgerow {
            species: HedgeSpecies::Vetiver,
        },
        spacing: Some(Spacing::SlipSpacing {
            cm: HEDGEROW_SLIP_SPACING_CM,
        }),
        timeline,
        upslope_offset_m: Some(UPSLOPE_OFFSET_M),
        hedgerow_interval_m: slope.and_then(|s| s.hedgerow_interval_m()),
    }
}
