#[allow(dead_code)]
mod common;

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use common::ready_session;
use fieldtrace_core::config::{MapConfig, ServiceConfig, WorkflowConfig};
use fieldtrace_core::consts::{DEFAULT_CENTER_LATITUDE, DEFAULT_SERVICE_URL};
use fieldtrace_core::error::PipelineError;
use fieldtrace_core::stages::StageId;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_default_config() {
    let config = WorkflowConfig::default();
    assert_eq!(config.service.base_url, DEFAULT_SERVICE_URL);
    assert_eq!(config.service.timeout(), Duration::from_secs(60));
    assert_eq!((config.raster.width, config.raster.height), (640, 640));
    assert_eq!(config.raster.tile_size, 256);
    assert_eq!(config.map.zoom, 17);
    assert_eq!(config.map.center_latitude, DEFAULT_CENTER_LATITUDE);
    assert!(config.parameters.is_empty());
}

#[test]
fn test_default_center_is_valid() {
    let center = MapConfig::default().center().unwrap();
    assert!(center.latitude() > 32.0 && center.latitude() < 33.0);
}

#[test]
fn test_empty_toml_gives_defaults() {
    let config = WorkflowConfig::from_toml_str("").unwrap();
    assert_eq!(config, WorkflowConfig::default());
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[test]
fn test_partial_toml_keeps_other_defaults() {
    let config = WorkflowConfig::from_toml_str(
        r#"
        [service]
        base_url = "http://10.0.0.5:5000"

        [parameters.density_mask]
        window_size = 9
        "#,
    )
    .unwrap();
    assert_eq!(config.service.base_url, "http://10.0.0.5:5000");
    assert_eq!(config.service.timeout_secs, ServiceConfig::default().timeout_secs);
    assert_eq!(config.map, MapConfig::default());
    assert_eq!(config.parameters["density_mask"]["window_size"], 9.0);
}

#[test]
fn test_round_trip_through_toml() {
    let mut config = WorkflowConfig::default();
    config.map.zoom = 18;
    config
        .parameters
        .entry("smoothing".into())
        .or_default()
        .insert("epsilon_factor".into(), 0.002);

    let text = config.to_toml().unwrap();
    let back = WorkflowConfig::from_toml_str(&text).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let err = WorkflowConfig::from_toml_str("[service\nbase_url = 1").unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[map]\nzoom = 16").unwrap();
    let config = WorkflowConfig::load(file.path()).unwrap();
    assert_eq!(config.map.zoom, 16);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = WorkflowConfig::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));
}

// ---------------------------------------------------------------------------
// Parameter overrides
// ---------------------------------------------------------------------------

#[test]
fn test_apply_parameters_sets_values() {
    let config = WorkflowConfig::from_toml_str(
        r#"
        [parameters.crop]
        radius_size = 80

        [parameters.map-render]
        radius_meters = 120.5
        "#,
    )
    .unwrap();
    let mut session = ready_session();
    config.apply_parameters(&mut session).unwrap();
    assert_eq!(session.parameter(StageId::Crop, "radius_size").unwrap(), 80.0);
    assert_eq!(
        session.parameter(StageId::MapRender, "radius_meters").unwrap(),
        120.5
    );
}

#[test]
fn test_apply_parameters_rejects_out_of_range() {
    let config = WorkflowConfig::from_toml_str(
        r#"
        [parameters.density_mask]
        window_size = 500
        "#,
    )
    .unwrap();
    let mut session = ready_session();
    let err = config.apply_parameters(&mut session).unwrap_err();
    assert!(matches!(err, PipelineError::OutOfRange { .. }));
}

#[test]
fn test_apply_parameters_rejects_unknown_stage() {
    let config = WorkflowConfig::from_toml_str(
        r#"
        [parameters.sharpen]
        amount = 1.0
        "#,
    )
    .unwrap();
    let mut session = ready_session();
    assert!(matches!(
        config.apply_parameters(&mut session).unwrap_err(),
        PipelineError::UnknownStage(_)
    ));
}
