//! Soil-line location along the reference axis.
//!
//! The strip under the pin is sampled from the exposed top end downwards. The
//! first samples define the look of the exposed pin; the soil line is where the
//! strip stops looking like that for a sustained run of samples. Single-sample
//! spikes (graduation ticks, specks of dirt) are ignored by the run length.

use image::{DynamicImage, RgbImage};
use tracing::debug;

use crate::config::SoilLineConfig;
use crate::error::SoilLineError;
use crate::models::{ReferenceObject, SoilLine};

/// Samples used for the exposed-pin signature, at minimum.
const MIN_SIGNATURE_SAMPLES: usize = 3;

/// Upper bound on the signature window, in transition runs.
const SIGNATURE_RUNS: usize = 2;

/// Colour and texture statistics of one cross-section of the strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripSample {
    pub mean: [f32; 3],
    /// Standard deviation of luma across the strip.
    pub texture: f32,
}

impl StripSample {
    fn deviation(&self, signature: &StripSample, texture_weight: f32) -> f32 {
        let color = self.mean.iter()
            .zip(signature.mean.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt();
        color + texture_weight * (self.texture - signature.texture).abs()
    }
}

fn luma(rgb: [f32; 3]) -> f32 {
    0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2]
}

/// Sample one cross-section per axial pixel, from `top` to `bottom`.
pub fn sample_strip(image: &RgbImage, reference: &ReferenceObject, half_width: u32) -> Vec<StripSample> {
    let (width, height) = image.dimensions();
    let (ax, ay) = reference.axis();
    let normal = (-ay, ax);
    let count = reference.pixel_length.floor().max(0.0) as usize;
    let half = half_width as i32;

    let mut samples = Vec::with_capacity(count);
    for offset in 0..count {
        let center = reference.point_at(offset as f32);
        let mut colors: Vec<[f32; 3]> = Vec::with_capacity((2 * half + 1) as usize);

        for s in -half..=half {
            let x = (center.x + normal.0 * s as f32).round();
            let y = (center.y + normal.1 * s as f32).round();
            if x < 0.0 || y < 0.0 || x >= width as f32 || y >= height as f32 {
                continue;
            }
            let p = image.get_pixel(x as u32, y as u32);
            colors.push([p[0] as f32, p[1] as f32, p[2] as f32]);
        }

        if colors.is_empty() {
            // Axis point itself is clamped into the image, so this only happens on bad geometry
            let x = (center.x.round() as u32).min(width.saturating_sub(1));
            let y = (center.y.round() as u32).min(height.saturating_sub(1));
            let p = image.get_pixel(x, y);
            colors.push([p[0] as f32, p[1] as f32, p[2] as f32]);
        }

        let n = colors.len() as f32;
        let mut mean = [0.0f32; 3];
        for c in &colors {
            for k in 0..3 {
                mean[k] += c[k] / n;
            }
        }
        let luma_mean = luma(mean);
        let variance = colors.iter()
            .map(|c| {
                let d = luma(*c) - luma_mean;
                d * d
            })
            .sum::<f32>() / n;

        samples.push(StripSample {
            mean,
            texture: variance.sqrt(),
        });
    }

    samples
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Per-channel median of the given samples.
fn signature(samples: &[StripSample]) -> StripSample {
    let channel = |f: &dyn Fn(&StripSample) -> f32| {
        let mut values: Vec<f32> = samples.iter().map(f).collect();
        median(&mut values)
    };
    StripSample {
        mean: [
            channel(&|s| s.mean[0]),
            channel(&|s| s.mean[1]),
            channel(&|s| s.mean[2]),
        ],
        texture: channel(&|s| s.texture),
    }
}

/// Number of top samples that make up the exposed-pin signature.
///
/// A share of the axis on short pins, but never more than a couple of
/// transition runs: a long pin with little exposed would otherwise take its
/// signature from the buried section.
pub fn signature_len(samples: usize, reference_fraction: f32, run_length: usize) -> usize {
    let by_fraction = (samples as f32 * reference_fraction).ceil() as usize;
    by_fraction
        .min(run_length * SIGNATURE_RUNS)
        .max(MIN_SIGNATURE_SAMPLES)
}

/// Locate the soil line in a sequence of deviations from the exposed signature.
/// Returns the offset of the first sample of the first run of `run_length`
/// samples that all exceed `threshold`.
pub fn find_transition(deviations: &[f32], threshold: f32, run_length: usize) -> Option<usize> {
    let mut run = 0;
    for (i, d) in deviations.iter().enumerate() {
        if *d > threshold {
            run += 1;
            if run >= run_length {
                return Some(i + 1 - run_length);
            }
        } else {
            run = 0;
        }
    }
    None
}

/// Quality of a transition at `start`, in [0, 1].
pub fn transition_quality(deviations: &[f32], start: usize, threshold: f32, run_length: usize) -> f32 {
    let run_end = (start + run_length).min(deviations.len());
    let run = &deviations[start..run_end];
    let step = run.iter().sum::<f32>() / run.len().max(1) as f32;
    let contrast = (step / (2.0 * threshold)).clamp(0.0, 1.0);

    let below = &deviations[start..];
    let persistence = below.iter().filter(|d| **d > threshold).count() as f32 / below.len().max(1) as f32;

    let ramp = deviations[..start]
        .iter()
        .rev()
        .take_while(|d| **d > threshold / 2.0)
        .count();
    let sharpness = 1.0 / (1.0 + ramp as f32);

    (contrast + persistence + sharpness) / 3.0
}

/// Find the exposed/buried boundary along a detected reference object.
pub fn locate_soil_line(
    image: &DynamicImage,
    reference: &ReferenceObject,
    config: &SoilLineConfig,
) -> Result<SoilLine, SoilLineError> {
    let rgb = image.to_rgb8();
    let fit_half = ((reference.pixel_width - 1.0) / 2.0).floor().max(0.0) as u32;
    let half_width = config.strip_half_width.min(fit_half);
    let samples = sample_strip(&rgb, reference, half_width);

    let run_length = config.transition_run_length.max(1);
    let signature_len = signature_len(samples.len(), config.reference_fraction, run_length);
    let required = MIN_SIGNATURE_SAMPLES + run_length;
    if samples.len() < required || samples.len() < signature_len {
        return Err(SoilLineError::TooFewSamples {
            samples: samples.len(),
            required: required.max(signature_len),
        });
    }

    let exposed = signature(&samples[..signature_len]);
    let deviations: Vec<f32> = samples.iter()
        .map(|s| s.deviation(&exposed, config.texture_weight))
        .collect();

    let start = find_transition(&deviations, config.transition_threshold, run_length)
        .ok_or(SoilLineError::NoTransition { run_length })?;
    // The top itself departs from the signature: the window was mostly buried pin
    if start == 0 {
        return Err(SoilLineError::NonUniformTop { window: signature_len });
    }

    let mut quality = transition_quality(&deviations, start, config.transition_threshold, run_length);
    if start < signature_len {
        // Part of the signature window lies below the soil line
        quality *= start as f32 / signature_len as f32;
    }
    let low_quality = quality < config.low_quality_threshold;

    let offset_px = start as f32;
    debug!(
        "Soil line at {:.0}px of {:.0}px along the pin, quality {:.2}{}",
        offset_px, reference.pixel_length, quality,
        if low_quality { " (low)" } else { "" }
    );

    Ok(SoilLine {
        offset_px,
        position: reference.point_at(offset_px),
        quality,
        low_quality,
    })
}
