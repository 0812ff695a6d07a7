use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashMap;
use crate::models::Contour;

/// Find foreground regions in a binary mask using connected components.
/// `contrast` supplies the per-pixel background difference summed into each region.
pub fn find_contours(mask: &GrayImage, contrast: &GrayImage, min_area: u32) -> Vec<Contour> {
    let labeled = connected_components(mask, Connectivity::Eight, Luma([0]));

    let mut regions: HashMap<u32, Contour> = HashMap::new();

    for (x, y, label) in labeled.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue; // Skip background
        }
        let diff = contrast.get_pixel(x, y)[0] as f32;

        regions.entry(label_val)
            .and_modify(|c| {
                c.min_x = c.min_x.min(x);
                c.min_y = c.min_y.min(y);
                c.max_x = c.max_x.max(x);
                c.max_y = c.max_y.max(y);
                c.points.push((x, y));
                c.contrast_sum += diff;
            })
            .or_insert_with(|| Contour {
                label: label_val,
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                points: vec![(x, y)],
                contrast_sum: diff,
            });
    }

    // Labels are assigned in raster order, so sorting keeps results reproducible
    let mut contours: Vec<Contour> = regions.into_values()
        .filter(|c| c.area() >= min_area)
        .collect();
    contours.sort_by_key(|c| c.label);
    contours
}
