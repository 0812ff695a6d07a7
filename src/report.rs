//! Site-level summary and the serializable report wrapper.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::orchestrator::LocationResult;
use crate::risk::RiskTier;

/// Widest row of the risk map grid.
pub const RISK_MAP_MAX_COLUMNS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl TierCounts {
    pub fn count(&mut self, tier: RiskTier) {
        match tier {
            RiskTier::Low => self.low += 1,
            RiskTier::Medium => self.medium += 1,
            RiskTier::High => self.high += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }
}

/// Statistics over assessed locations' aggregated depths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthStats {
    pub mean_mm: f32,
    pub min_mm: f32,
    pub max_mm: f32,
    pub total_mm: f32,
}

/// One cell of the risk map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMapCell {
    pub location_id: String,
    /// Short marker, `L1`, `L2`, ... in location order.
    pub label: String,
    pub row: usize,
    pub column: usize,
    pub tier: Option<RiskTier>,
    pub depth_mm: Option<f32>,
    /// High-risk cells get a hedgerow drawn upslope.
    pub hedgerow: bool,
}

/// Locations laid out on a small grid in id order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMap {
    pub rows: usize,
    pub columns: usize,
    pub cells: Vec<RiskMapCell>,
}

impl RiskMap {
    fn layout(locations: &[LocationResult]) -> Self {
        let columns = locations.len().min(RISK_MAP_MAX_COLUMNS);
        let rows = if columns == 0 { 0 } else { locations.len().div_ceil(columns) };

        let cells = locations
            .iter()
            .enumerate()
            .map(|(i, location)| {
                let tier = location.tier();
                RiskMapCell {
                    location_id: location.location_id.clone(),
                    label: format!("L{}", i + 1),
                    row: i / columns,
                    column: i % columns,
                    tier,
                    depth_mm: location.assessment.as_ref().map(|a| a.depth_mm),
                    hedgerow: tier == Some(RiskTier::High),
                }
            })
            .collect();

        Self { rows, columns, cells }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&RiskMapCell> {
        self.cells.iter().find(|c| c.row == row && c.column == column)
    }
}

/// Aggregate view over every location of a site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSummary {
    pub tier_counts: TierCounts,
    /// Locations with no usable measurement at all.
    pub unassessed_locations: usize,
    pub images_processed: usize,
    pub images_unprocessed: usize,
    pub depth_stats: Option<DepthStats>,
    /// Ordered by location id.
    pub locations: Vec<LocationResult>,
    pub risk_map: RiskMap,
}

impl SiteSummary {
    pub fn location(&self, location_id: &str) -> Option<&LocationResult> {
        self.locations.iter().find(|l| l.location_id == location_id)
    }
}

/// Summarise per-location results. Input order does not matter.
pub fn build_site_summary(mut locations: Vec<LocationResult>) -> SiteSummary {
    locations.sort_by(|a, b| a.location_id.cmp(&b.location_id));

    let mut tier_counts = TierCounts::default();
    let mut unassessed_locations = 0;
    let mut depths = Vec::new();
    for location in &locations {
        match &location.assessment {
            Some(assessment) => {
                tier_counts.count(assessment.tier);
                depths.push(assessment.depth_mm);
            }
            None => unassessed_locations += 1,
        }
    }

    let depth_stats = if depths.is_empty() {
        None
    } else {
        let total_mm: f32 = depths.iter().sum();
        Some(DepthStats {
            mean_mm: total_mm / depths.len() as f32,
            min_mm: depths.iter().copied().fold(f32::INFINITY, f32::min),
            max_mm: depths.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            total_mm,
        })
    };

    let images_processed = locations.iter().map(|l| l.measurements.len()).sum();
    let images_unprocessed = locations.iter().map(|l| l.failures.len()).sum();
    let risk_map = RiskMap::layout(&locations);

    SiteSummary {
        tier_counts,
        unassessed_locations,
        images_processed,
        images_unprocessed,
        depth_stats,
        locations,
        risk_map,
    }
}

/// A summary stamped with an id and generation time, ready to serialize.
#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub summary: SiteSummary,
}

impl SiteReport {
    pub fn new(summary: SiteSummary) -> Self {
        Self {
            id: Uuid::new_v4(),
            generated_at: OffsetDateTime::now_utc(),
            summary,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
