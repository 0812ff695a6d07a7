use erosionwatch::{AnalysisConfig, ImageInput, Orchestrator, SiteReport};
use image::{DynamicImage, ImageBuffer, Rgb};

/// Render a field photo: textured soil, a pin of `pin_rows` rows, buried below `soil_row`.
fn render_pin(pin_rows: (u32, u32), soil_row: u32) -> DynamicImage {
    let img = ImageBuffer::from_fn(200, 300, |x, y| {
        let grain = ((x as u64 * 7919 + y as u64 * 104729) % 17) as i16 - 8;
        let on_pin = (96..104).contains(&x) && (pin_rows.0..pin_rows.1).contains(&y);
        if on_pin && y < soil_row {
            Rgb([215, 215, 215])
        } else if on_pin {
            Rgb([170, 140, 105])
        } else {
            Rgb([110, 80, 55].map(|c: u8| (c as i16 + grain).clamp(0, 255) as u8))
        }
    });
    DynamicImage::ImageRgb8(img)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .init();

    // A 240mm pin installed with 100mm showing
    let config = AnalysisConfig {
        reference_physical_length_mm: 240.0,
        baseline_exposed_length_mm: 100.0,
        slope_percent: Some(15.0),
        ..AnalysisConfig::default()
    };

    let inputs = vec![
        ImageInput::new("location_1_a.png", "location-1", render_pin((30, 270), 135)),
        ImageInput::new("location_1_b.png", "location-1", render_pin((30, 270), 137)),
        ImageInput::new("location_2_a.png", "location-2", render_pin((30, 270), 150)),
        ImageInput::new("location_3_a.png", "location-3", render_pin((30, 270), 200)),
        // Nothing to measure here
        ImageInput::new("location_4_a.png", "location-4", render_pin((0, 0), 0)),
    ];

    println!("=== Synthetic Site ===");
    let orchestrator = Orchestrator::new(config);
    let summary = orchestrator.analyze_batch(&inputs);

    for location in &summary.locations {
        match &location.assessment {
            Some(a) => println!(
                "  {}: {:.1}mm, {} risk, {}",
                location.location_id,
                a.depth_mm,
                a.tier,
                a.recommendation.timeline.as_str()
            ),
            None => println!("  {}: not assessed ({} failed)", location.location_id, location.failures.len()),
        }
    }

    println!("\n=== Report ===");
    println!("{}", SiteReport::new(summary).to_json()?);
    Ok(())
}
