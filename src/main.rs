use anyhow::Context;
use clap::Parser;
use image::{DynamicImage, ImageReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, Level};

use erosionwatch::error::AnalysisError;
use erosionwatch::{
    location_id_from_filename, AnalysisConfig, ImageFailure, ImageInput, ImageOutcome,
    Orchestrator, SiteReport, SiteSummary,
};

#[derive(Parser)]
#[command(name = "erosionwatch")]
#[command(about = "Measure soil erosion from photos of graduated reference pins")]
struct Cli {
    /// Photos to analyse
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// TOML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Physical length of the reference pin in millimeters
    #[arg(long, value_name = "MM")]
    pin_length_mm: Option<f32>,

    /// Exposed pin length recorded at installation
    #[arg(long, value_name = "MM")]
    baseline_mm: Option<f32>,

    /// Terrain gradient in percent, for hedgerow spacing
    #[arg(long, value_name = "PERCENT")]
    slope_percent: Option<f32>,

    /// Treat every photo as taken at this location instead of parsing file names
    #[arg(long, value_name = "ID")]
    location: Option<String>,

    /// Minimum measurement confidence used in a location's mean
    #[arg(long, value_name = "0-1")]
    quality_floor: Option<f32>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn build_config(&self) -> anyhow::Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => AnalysisConfig::default(),
        };

        if let Some(length) = self.pin_length_mm {
            config.reference_physical_length_mm = length;
        }
        if let Some(baseline) = self.baseline_mm {
            config.baseline_exposed_length_mm = baseline;
        }
        if let Some(slope) = self.slope_percent {
            config.slope_percent = Some(slope);
        }
        if let Some(floor) = self.quality_floor {
            config.aggregation.quality_floor = floor;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn decode(path: &Path) -> anyhow::Result<DynamicImage> {
    let image = ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok(image)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_summary(summary: &SiteSummary) {
    println!("\n=== Erosion Assessment ===");
    println!(
        "Photos: {} measured, {} unprocessed",
        summary.images_processed, summary.images_unprocessed
    );
    println!(
        "Locations: {} high, {} medium, {} low, {} unassessed",
        summary.tier_counts.high,
        summary.tier_counts.medium,
        summary.tier_counts.low,
        summary.unassessed_locations
    );
    if let Some(stats) = &summary.depth_stats {
        println!(
            "Depth: mean {:.1}mm, min {:.1}mm, max {:.1}mm",
            stats.mean_mm, stats.min_mm, stats.max_mm
        );
    }

    println!();
    for location in &summary.locations {
        match &location.assessment {
            Some(a) => {
                let rec = &a.recommendation;
                let deadline = rec.timeline.approx_days()
                    .map(|d| format!(" (~{} days)", d))
                    .unwrap_or_default();
                println!(
                    "  {:<16} {:>6.1}mm  {:<6}  confidence {:.2}  {} photo(s)  {}{}",
                    location.location_id,
                    a.depth_mm,
                    a.tier,
                    a.confidence,
                    a.samples_used,
                    rec.timeline.as_str(),
                    deadline
                );
                if let Some(interval) = rec.hedgerow_interval_m {
                    println!("  {:<16} hedgerows every {:.1}m", "", interval);
                }
            }
            None => println!("  {:<16} not assessed", location.location_id),
        }
        for failure in &location.failures {
            println!("  {:<16}   {}: {}", "", failure.source_id, failure.message);
        }
    }

    println!("\nRisk map:");
    for row in 0..summary.risk_map.rows {
        let line: Vec<String> = (0..summary.risk_map.columns)
            .filter_map(|col| summary.risk_map.cell(row, col))
            .map(|cell| {
                let tier = cell.tier.map(|t| t.as_str()).unwrap_or("-");
                let marker = if cell.hedgerow { "*" } else { " " };
                format!("{:>3} {:<6}{}", cell.label, tier, marker)
            })
            .collect();
        println!("  {}", line.join("  "));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = args.build_config()?;

    // Decode all photos concurrently
    let mut decoding = JoinSet::new();
    for path in args.images.iter().cloned() {
        decoding.spawn_blocking(move || {
            let image = decode(&path);
            (path, image)
        });
    }

    let mut decoded = Vec::new();
    while let Some(joined) = decoding.join_next().await {
        decoded.push(joined.context("Image decoding task panicked")?);
    }
    decoded.sort_by(|a, b| a.0.cmp(&b.0));

    let mut inputs = Vec::new();
    let mut unreadable = Vec::new();
    for (path, image) in decoded {
        // Full path: photos from different folders may share a file name
        let source_id = path.display().to_string();
        let location_id = args
            .location
            .clone()
            .unwrap_or_else(|| location_id_from_filename(&file_name(&path)));
        match image {
            Ok(image) => {
                info!("{}: {}x{} -> {}", source_id, image.width(), image.height(), location_id);
                inputs.push(ImageInput {
                    source_id,
                    location_id,
                    image: Arc::new(image),
                    overrides: None,
                });
            }
            Err(e) => {
                let error = AnalysisError::InvalidImage(format!("{:#}", e));
                let failure = ImageFailure::from_error(&source_id, &error);
                unreadable.push((location_id, ImageOutcome::Failed(failure)));
            }
        }
    }

    let orchestrator = Orchestrator::new(config);
    let summary = tokio::task::spawn_blocking(move || {
        let mut outcomes = orchestrator.analyze_all(&inputs);
        outcomes.extend(unreadable);
        orchestrator.summarize(outcomes)
    })
    .await
    .context("Analysis task panicked")?;

    if args.json {
        let report = SiteReport::new(summary);
        println!("{}", report.to_json()?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}
