use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use fieldtrace_core::config::WorkflowConfig;
use fieldtrace_core::error::StageError;
use fieldtrace_core::geo::{GeoPoint, PixelPoint};
use fieldtrace_core::pipeline::{PipelineObserver, PipelineOrchestrator};
use fieldtrace_core::service::{HttpProcessingService, ProcessingService};
use fieldtrace_core::session::{Artifact, RasterContext, Session};
use fieldtrace_core::stages::StageId;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::summary::print_run_summary;

#[derive(Args)]
pub struct RunArgs {
    /// Latitude of the point inside the field
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude of the point inside the field
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,

    /// Raster center latitude (defaults to the selected point)
    #[arg(long, allow_hyphen_values = true)]
    pub center_lat: Option<f64>,

    /// Raster center longitude (defaults to the selected point)
    #[arg(long, allow_hyphen_values = true)]
    pub center_lng: Option<f64>,

    /// Zoom level of the raster (overrides config)
    #[arg(long)]
    pub zoom: Option<u8>,

    /// Satellite image to upload for the first stage
    #[arg(long, conflicts_with = "static_map_key")]
    pub image: Option<PathBuf>,

    /// Let the service fetch a static map capture signed with this key
    #[arg(long)]
    pub static_map_key: Option<String>,

    /// Pin the selected pixel instead of deriving it from the coordinate
    #[arg(long, requires = "pixel_y")]
    pub pixel_x: Option<f64>,

    #[arg(long, requires = "pixel_x")]
    pub pixel_y: Option<f64>,

    /// Stop after this stage instead of running the whole pipeline
    #[arg(long)]
    pub until: Option<StageId>,

    /// Parameter override, e.g. density_mask.window_size=7 (repeatable)
    #[arg(long = "param")]
    pub params: Vec<String>,

    /// Workflow config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Processing service URL (overrides config)
    #[arg(long)]
    pub service_url: Option<String>,

    /// Per-request timeout in seconds (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Download every produced artifact into this directory
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Drives a progress bar from pipeline events.
struct ProgressObserver {
    pb: ProgressBar,
}

impl PipelineObserver for ProgressObserver {
    fn stage_started(&self, stage: StageId) {
        self.pb.set_message(stage.definition().title);
    }

    fn artifact_ready(&self, _artifact: &Artifact) {
        self.pb.inc(1);
    }

    fn stage_failed(&self, error: &StageError) {
        self.pb.abandon_with_message(format!("Failed at {}", error.stage));
    }

    fn pipeline_complete(&self) {
        self.pb.finish_with_message("Done");
    }
}

/// Split `stage.name=value`.
fn parse_param(spec: &str) -> Result<(&str, &str, f64)> {
    let (key, value) = spec
        .split_once('=')
        .with_context(|| format!("Parameter '{spec}' is missing '='"))?;
    let (stage, name) = key
        .rsplit_once('.')
        .with_context(|| format!("Parameter '{spec}' must be stage.name=value"))?;
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("Parameter '{spec}' has a non-numeric value"))?;
    Ok((stage.trim(), name.trim(), value))
}

fn build_session(args: &RunArgs, config: &WorkflowConfig) -> Result<Session> {
    let point = GeoPoint::new(args.lat, args.lng)?;
    let center = match (args.center_lat, args.center_lng) {
        (Some(lat), Some(lng)) => GeoPoint::new(lat, lng)?,
        (None, None) => point,
        _ => bail!("--center-lat and --center-lng must be given together"),
    };
    let zoom = args.zoom.unwrap_or(config.map.zoom);

    let raster = if let Some(ref path) = args.image {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        RasterContext::from_image_bytes(data, center, zoom)?
    } else if let Some(ref key) = args.static_map_key {
        RasterContext::static_map(
            center,
            zoom,
            config.raster.width,
            config.raster.height,
            key,
        )?
    } else {
        bail!("Provide either --image or --static-map-key");
    };

    let mut session = Session::new(point);
    session.attach_raster(raster.with_tile_size(config.raster.tile_size));
    config.apply_parameters(&mut session)?;
    for spec in &args.params {
        let (stage, name, value) = parse_param(spec)?;
        session.set_parameter_by_name(stage, name, value)?;
    }
    if let (Some(x), Some(y)) = (args.pixel_x, args.pixel_y) {
        session.set_pixel_point(PixelPoint::new(x, y))?;
    }
    Ok(session)
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut config = match args.config {
        Some(ref path) => WorkflowConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => WorkflowConfig::default(),
    };
    if let Some(ref url) = args.service_url {
        config.service.base_url = url.clone();
    }
    if let Some(secs) = args.timeout {
        config.service.timeout_secs = secs;
    }

    let session = build_session(args, &config)?;
    let last = args.until.unwrap_or(StageId::LAST);

    println!("Field trace");
    println!("  Point:    {}", session.point());
    println!("  Service:  {}", config.service.base_url);
    println!("  Stages:   {} .. {}", StageId::FIRST, last);
    println!();

    let pb = ProgressBar::new(last.order() as u64 + 1);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:20} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let service = Arc::new(HttpProcessingService::new(&config.service));
    let orchestrator = PipelineOrchestrator::new(session, service.clone())
        .with_observer(Arc::new(ProgressObserver { pb: pb.clone() }));

    let outcome = if last == StageId::LAST {
        orchestrator.run_remaining(StageId::FIRST).map(drop)
    } else {
        StageId::ALL[..=last.order()]
            .iter()
            .try_for_each(|stage| orchestrator.advance(*stage).map(drop))
    };
    if outcome.is_ok() && !pb.is_finished() {
        pb.finish_with_message(format!("Stopped after {last}"));
    }

    let state = orchestrator.state();
    let session = orchestrator.into_session();
    print_run_summary(&session, &state, &config.service.base_url);

    if let Some(ref dir) = args.export {
        export_artifacts(service.as_ref(), &session, dir)?;
    }

    outcome.context("Pipeline did not complete")
}

fn export_artifacts(service: &dyn ProcessingService, session: &Session, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for artifact in session.artifacts() {
        let bytes = service
            .fetch_artifact(artifact)
            .with_context(|| format!("Failed to fetch {}", artifact.name))?;
        let path = dir.join(artifact.name);
        std::fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = bytes.len(), "Artifact exported");
    }
    println!("Artifacts saved to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        let (stage, name, value) = parse_param("density_mask.window_size=7").unwrap();
        assert_eq!((stage, name, value), ("density_mask", "window_size", 7.0));
    }

    #[test]
    fn test_parse_param_rejects_malformed() {
        assert!(parse_param("window_size=7").is_err());
        assert!(parse_param("smoothing.epsilon_factor").is_err());
        assert!(parse_param("smoothing.epsilon_factor=abc").is_err());
    }
}
