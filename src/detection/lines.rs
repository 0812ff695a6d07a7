//! Principal-axis line fitting and candidate selection for elongated regions.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::debug;

use crate::config::DetectorConfig;
use crate::models::{Contour, PixelPoint, ReferenceObject};

/// Second-moment line fit of a pixel set.
#[derive(Debug, Clone)]
pub struct LineFit {
    pub centroid: (f64, f64),
    /// Unit major axis, oriented so it points down the image.
    pub axis: (f64, f64),
    pub min_proj: f64,
    pub max_proj: f64,
    pub min_perp: f64,
    pub max_perp: f64,
    pub pixel_count: usize,
    /// Number of one-pixel axial bins containing at least one pixel.
    pub covered_bins: usize,
    pub mean_contrast: f32,
}

impl LineFit {
    /// Fit a line to `points`. Returns `None` for an empty set.
    pub fn fit(points: &[(u32, u32)], contrast_sum: f32) -> Option<LineFit> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), &(x, y)| {
            (sx + x as f64, sy + y as f64)
        });
        let (cx, cy) = (sx / n, sy / n);

        let (mut cxx, mut cyy, mut cxy) = (0.0, 0.0, 0.0);
        for &(x, y) in points {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            cxx += dx * dx;
            cyy += dy * dy;
            cxy += dx * dy;
        }

        let theta = 0.5 * (2.0 * cxy).atan2(cxx - cyy);
        let mut axis = (theta.cos(), theta.sin());
        if axis.1 < 0.0 || (axis.1 == 0.0 && axis.0 < 0.0) {
            axis = (-axis.0, -axis.1);
        }
        let normal = (-axis.1, axis.0);

        let mut min_proj = f64::INFINITY;
        let mut max_proj = f64::NEG_INFINITY;
        let mut min_perp = f64::INFINITY;
        let mut max_perp = f64::NEG_INFINITY;
        let mut projections = Vec::with_capacity(points.len());
        for &(x, y) in points {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let proj = dx * axis.0 + dy * axis.1;
            let perp = dx * normal.0 + dy * normal.1;
            min_proj = min_proj.min(proj);
            max_proj = max_proj.max(proj);
            min_perp = min_perp.min(perp);
            max_perp = max_perp.max(perp);
            projections.push(proj);
        }

        let bins = ((max_proj - min_proj).floor() as usize) + 1;
        let mut covered = vec![false; bins];
        for proj in projections {
            let bin = ((proj - min_proj).floor() as usize).min(bins - 1);
            covered[bin] = true;
        }
        let covered_bins = covered.iter().filter(|c| **c).count();

        Some(LineFit {
            centroid: (cx, cy),
            axis,
            min_proj,
            max_proj,
            min_perp,
            max_perp,
            pixel_count: points.len(),
            covered_bins,
            mean_contrast: contrast_sum / points.len() as f32,
        })
    }

    /// Extent along the axis in pixels.
    pub fn length(&self) -> f32 {
        (self.max_proj - self.min_proj + 1.0) as f32
    }

    /// Extent across the axis in pixels.
    pub fn width(&self) -> f32 {
        (self.max_perp - self.min_perp + 1.0) as f32
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.length() / self.width()
    }

    /// Share of the axial extent that contains pixels.
    pub fn coverage(&self) -> f32 {
        let bins = ((self.max_proj - self.min_proj).floor() as usize) + 1;
        self.covered_bins as f32 / bins as f32
    }

    pub fn visible_length(&self) -> f32 {
        self.length() * self.coverage()
    }

    /// Pixels per covered axial bin.
    pub fn mean_width(&self) -> f32 {
        if self.covered_bins == 0 {
            return 0.0;
        }
        self.pixel_count as f32 / self.covered_bins as f32
    }

    /// 1.0 for a straight bar, lower when the region bends or splays.
    pub fn straightness(&self) -> f32 {
        (self.mean_width() / self.width()).clamp(0.0, 1.0)
    }

    pub fn orientation_deg(&self) -> f32 {
        // axis.1 >= 0, so this stays within (-90, 90]
        self.axis.0.atan2(self.axis.1).to_degrees() as f32
    }

    /// Perpendicular distance from a point to the fitted line.
    pub fn distance_to_line(&self, point: (f64, f64)) -> f64 {
        let dx = point.0 - self.centroid.0;
        let dy = point.1 - self.centroid.1;
        (dx * -self.axis.1 + dy * self.axis.0).abs()
    }

    /// Axial interval covered by this fit when projected onto `other`'s axis.
    pub fn projected_extent_on(&self, other: &LineFit) -> (f64, f64) {
        let project = |t: f64| {
            let x = self.centroid.0 + self.axis.0 * t - other.centroid.0;
            let y = self.centroid.1 + self.axis.1 * t - other.centroid.1;
            x * other.axis.0 + y * other.axis.1
        };
        let a = project(self.min_proj);
        let b = project(self.max_proj);
        (a.min(b), a.max(b))
    }

    /// Angle between two fitted axes in degrees, in [0, 90].
    pub fn angle_to(&self, other: &LineFit) -> f64 {
        let dot = (self.axis.0 * other.axis.0 + self.axis.1 * other.axis.1).abs();
        dot.min(1.0).acos().to_degrees()
    }

    /// Axial interval of the fitted segment that lies inside a `width` x `height` image.
    pub fn clip_to_image(&self, width: u32, height: u32) -> (f64, f64) {
        let (mut t0, mut t1) = (self.min_proj, self.max_proj);
        let limits = [
            (self.centroid.0, self.axis.0, width.saturating_sub(1) as f64),
            (self.centroid.1, self.axis.1, height.saturating_sub(1) as f64),
        ];
        for (origin, direction, max) in limits {
            if direction.abs() < 1e-9 {
                continue;
            }
            let a = -origin / direction;
            let b = (max - origin) / direction;
            t0 = t0.max(a.min(b));
            t1 = t1.min(a.max(b));
        }
        // The centroid lies inside the image, so t = 0 is always kept
        (t0.min(0.0), t1.max(0.0))
    }

    fn endpoint(&self, t: f64) -> (f64, f64) {
        (
            self.centroid.0 + self.axis.0 * t,
            self.centroid.1 + self.axis.1 * t,
        )
    }
}

/// A fitted group of contours that could be the reference pin.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Labels of the merged contours.
    pub members: BTreeSet<u32>,
    pub fit: LineFit,
}

impl Candidate {
    /// Detection confidence in [0, 1].
    pub fn confidence(&self, config: &DetectorConfig) -> f32 {
        let aspect_score = (self.fit.aspect_ratio() / (2.0 * config.min_aspect_ratio)).clamp(0.0, 1.0);
        let contrast_score = (self.fit.mean_contrast / (2.0 * config.contrast_threshold)).clamp(0.0, 1.0);
        self.fit.straightness() * aspect_score * contrast_score * self.fit.coverage()
    }

    pub fn qualifies(&self, config: &DetectorConfig) -> bool {
        self.fit.visible_length() >= config.min_detection_pixel_length
            && self.fit.aspect_ratio() >= config.min_aspect_ratio
            && self.fit.straightness() >= config.min_straightness
    }

    /// Convert to a reference object clipped to a `width` x `height` image.
    ///
    /// The fitted segment is cut where the axis leaves the image, so both
    /// endpoints stay on the fitted line.
    pub fn to_reference(&self, width: u32, height: u32, confidence: f32) -> ReferenceObject {
        let (t0, t1) = self.fit.clip_to_image(width, height);
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        // Rounding can leave a clipped endpoint a hair outside the image
        let point = |(x, y): (f64, f64)| {
            PixelPoint::new((x as f32).clamp(0.0, max_x), (y as f32).clamp(0.0, max_y))
        };
        let mut top = point(self.fit.endpoint(t0));
        let mut bottom = point(self.fit.endpoint(t1));
        if (bottom.y, bottom.x) < (top.y, top.x) {
            std::mem::swap(&mut top, &mut bottom);
        }
        let pixel_length = top.distance(&bottom) + 1.0;

        ReferenceObject {
            top,
            bottom,
            pixel_length,
            orientation_deg: self.fit.orientation_deg(),
            pixel_width: self.fit.mean_width(),
            confidence,
        }
    }
}

/// Order candidates best first: aspect ratio, then contrast, then size.
pub fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.fit.aspect_ratio().total_cmp(&a.fit.aspect_ratio())
        .then_with(|| b.fit.mean_contrast.total_cmp(&a.fit.mean_contrast))
        .then_with(|| b.fit.pixel_count.cmp(&a.fit.pixel_count))
        .then_with(|| a.members.cmp(&b.members))
}

/// Build candidates from contours, merging collinear fragments separated by occlusion.
pub fn build_candidates(contours: &[Contour], config: &DetectorConfig) -> Vec<Candidate> {
    let fits: Vec<Option<LineFit>> = contours
        .iter()
        .map(|c| LineFit::fit(&c.points, c.contrast_sum))
        .collect();

    let mut seen: BTreeSet<BTreeSet<u32>> = BTreeSet::new();
    let mut candidates = Vec::new();

    for (i, seed) in fits.iter().enumerate() {
        let Some(seed) = seed else { continue };
        if seed.aspect_ratio() < config.min_aspect_ratio {
            continue;
        }

        let mut members = vec![i];
        for (j, other) in fits.iter().enumerate() {
            let Some(other) = other else { continue };
            if j != i && is_collinear_fragment(seed, other, config) {
                members.push(j);
            }
        }

        let labels: BTreeSet<u32> = members.iter().map(|&m| contours[m].label).collect();
        if !seen.insert(labels.clone()) {
            continue;
        }

        let fit = if members.len() == 1 {
            seed.clone()
        } else {
            let mut points = Vec::new();
            let mut contrast_sum = 0.0;
            for &m in &members {
                points.extend_from_slice(&contours[m].points);
                contrast_sum += contours[m].contrast_sum;
            }
            debug!("Merged {} collinear fragments into one candidate", members.len());
            match LineFit::fit(&points, contrast_sum) {
                Some(fit) => fit,
                None => continue,
            }
        };

        candidates.push(Candidate { members: labels, fit });
    }

    candidates
}

fn is_collinear_fragment(seed: &LineFit, other: &LineFit, config: &DetectorConfig) -> bool {
    // Short blobs have no reliable direction of their own
    if other.aspect_ratio() >= 2.0 && seed.angle_to(other) > config.max_merge_angle_deg as f64 {
        return false;
    }
    if seed.distance_to_line(other.centroid) > seed.width() as f64 {
        return false;
    }
    let (a, b) = other.projected_extent_on(seed);
    let gap = (a - seed.max_proj).max(seed.min_proj - b).max(0.0);
    gap <= config.max_occlusion_gap_px as f64
}
