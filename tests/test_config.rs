use std::io::Write;

use erosionwatch::config::{AnalysisConfig, SiteOverrides};
use erosionwatch::error::ConfigError;

#[test]
fn test_defaults() {
    let config = AnalysisConfig::default();
    assert_eq!(config.reference_physical_length_mm, 300.0);
    assert_eq!(config.baseline_exposed_length_mm, 0.0);
    assert_eq!(config.detector.min_detection_pixel_length, 50.0);
    assert_eq!(config.soil_line.transition_run_length, 5);
    assert_eq!(config.aggregation.quality_floor, 0.5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_toml_keeps_defaults() -> anyhow::Result<()> {
    let config = AnalysisConfig::from_toml_str(
        r#"
        reference_physical_length_mm = 500.0
        slope_percent = 12.5

        [soil_line]
        transition_run_length = 8

        [aggregation]
        quality_floor = 0.7

        [locations.location-2]
        baseline_exposed_length_mm = 40.0
        "#,
    )?;

    assert_eq!(config.reference_physical_length_mm, 500.0);
    assert_eq!(config.slope_percent, Some(12.5));
    assert_eq!(config.soil_line.transition_run_length, 8);
    assert_eq!(config.soil_line.transition_threshold, 30.0);
    assert_eq!(config.aggregation.quality_floor, 0.7);
    assert_eq!(config.detector.min_detection_pixel_length, 50.0);
    assert_eq!(config.locations["location-2"].baseline_exposed_length_mm, Some(40.0));
    Ok(())
}

#[test]
fn test_load_from_file() -> anyhow::Result<()> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(file, "baseline_exposed_length_mm = 25.0")?;
    writeln!(file, "[detector]")?;
    writeln!(file, "min_detection_pixel_length = 80.0")?;

    let config = AnalysisConfig::load(file.path())?;
    assert_eq!(config.baseline_exposed_length_mm, 25.0);
    assert_eq!(config.detector.min_detection_pixel_length, 80.0);
    Ok(())
}

#[test]
fn test_missing_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let result = AnalysisConfig::load(dir.path().join("missing.toml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_malformed_toml() {
    let result = AnalysisConfig::from_toml_str("reference_physical_length_mm = \"long\"");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_validation_rejects_bad_values() {
    let cases = [
        ("reference_physical_length_mm = 0.0", "reference_physical_length_mm"),
        ("baseline_exposed_length_mm = -1.0", "baseline_exposed_length_mm"),
        ("[soil_line]\ntransition_run_length = 0", "soil_line.transition_run_length"),
        ("[aggregation]\nquality_floor = 1.5", "aggregation.quality_floor"),
        ("[detector]\nmin_detection_pixel_length = 0.0", "detector.min_detection_pixel_length"),
        ("[locations.a]\nreference_physical_length_mm = -3.0", "locations.reference_physical_length_mm"),
    ];

    for (toml, expected_field) in cases {
        match AnalysisConfig::from_toml_str(toml) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected_field, "for {:?}", toml),
            other => panic!("expected invalid {} for {:?}, got {:?}", expected_field, toml, other),
        }
    }
}

#[test]
fn test_resolve_layers_overrides() -> anyhow::Result<()> {
    let mut config = AnalysisConfig::default();
    config.locations.insert(
        "location-1".to_string(),
        SiteOverrides {
            reference_physical_length_mm: Some(250.0),
            baseline_exposed_length_mm: Some(20.0),
            slope_percent: Some(8.0),
        },
    );

    let site = config.resolve_for("location-1", None)?;
    assert_eq!(site.reference_physical_length_mm, 250.0);
    assert_eq!(site.baseline_exposed_length_mm, 20.0);

    let image = SiteOverrides {
        baseline_exposed_length_mm: Some(35.0),
        ..SiteOverrides::default()
    };
    let per_image = config.resolve_for("location-1", Some(&image))?;
    assert_eq!(per_image.reference_physical_length_mm, 250.0);
    assert_eq!(per_image.baseline_exposed_length_mm, 35.0);

    let other = config.resolve_for("location-9", None)?;
    assert_eq!(other.reference_physical_length_mm, 300.0);

    assert_eq!(config.slope_for("location-1"), Some(8.0));
    assert_eq!(config.slope_for("location-9"), None);
    Ok(())
}

#[test]
fn test_resolve_rejects_invalid_image_overrides() {
    let config = AnalysisConfig::default();
    let negative = SiteOverrides {
        baseline_exposed_length_mm: Some(-15.0),
        ..SiteOverrides::default()
    };

    match config.resolve_for("location-1", Some(&negative)) {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "baseline_exposed_length_mm"),
        other => panic!("expected an invalid baseline, got {:?}", other),
    }
}
