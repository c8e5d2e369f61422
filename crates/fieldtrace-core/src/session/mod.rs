//! Mutable state of one active workflow: the selected point, the raster it
//! sits in, and per-stage status, parameters and artifacts.

mod artifact;
mod raster;
mod stage_state;

pub use artifact::Artifact;
pub use raster::{ImageSource, RasterContext};
pub use stage_state::{StageParameter, StageState, StageStatus};

use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

use crate::consts::{DEFAULT_RASTER_SIZE, DEFAULT_ZOOM, TILE_SIZE};
use crate::error::{PipelineError, Result};
use crate::geo::{GeoPoint, MapView, PixelPoint};
use crate::stages::{definitions, StageId};

/// Aggregate root for one point selection.
#[derive(Clone, Debug)]
pub struct Session {
    point: GeoPoint,
    raster: Option<RasterContext>,
    /// Pixel set by a direct click on the raster; wins over the derived one.
    pixel_override: Option<PixelPoint>,
    stages: Vec<StageState>,
    /// Next generation stamp to hand out. Never reset, so stamps stay unique
    /// across point changes within the process.
    next_generation: u64,
}

impl Session {
    pub fn new(point: GeoPoint) -> Self {
        Self {
            point,
            raster: None,
            pixel_override: None,
            stages: definitions().iter().map(StageState::new).collect(),
            next_generation: 1,
        }
    }

    pub fn point(&self) -> GeoPoint {
        self.point
    }

    /// Replace the point of interest. The whole pipeline is invalidated.
    pub fn select_point(&mut self, point: GeoPoint) {
        info!(point = %point, "Point selected");
        self.point = point;
        self.pixel_override = None;
        self.reset_stages();
    }

    /// [`select_point`](Self::select_point) from raw degrees.
    pub fn select_coordinates(&mut self, latitude: f64, longitude: f64) -> Result<()> {
        let point = GeoPoint::new(latitude, longitude)?;
        self.select_point(point);
        Ok(())
    }

    pub fn raster(&self) -> Option<&RasterContext> {
        self.raster.as_ref()
    }

    /// Supply a new raster. The whole pipeline is invalidated.
    pub fn attach_raster(&mut self, raster: RasterContext) {
        info!(
            width = raster.width,
            height = raster.height,
            zoom = raster.zoom,
            center = %raster.center,
            "Raster attached"
        );
        self.raster = Some(raster);
        self.pixel_override = None;
        self.reset_stages();
    }

    /// Pin the selected pixel directly (a click on the raster). No geographic
    /// point is derived from it. Every stage is invalidated because the first
    /// stage consumes the pixel.
    pub fn set_pixel_point(&mut self, pixel: PixelPoint) -> Result<()> {
        let raster = self.raster.as_ref().ok_or(PipelineError::MissingRaster {
            stage: StageId::FIRST,
        })?;
        if !pixel.is_within(raster.width, raster.height) {
            return Err(PipelineError::PixelOutOfBounds {
                x: pixel.x,
                y: pixel.y,
                width: raster.width,
                height: raster.height,
            });
        }
        debug!(x = pixel.x, y = pixel.y, "Pixel point pinned");
        self.pixel_override = Some(pixel);
        self.invalidate_from(StageId::FIRST);
        Ok(())
    }

    /// Selected pixel: the pinned one if set, otherwise projected from the
    /// point and raster geometry.
    pub fn pixel_point(&self) -> Option<PixelPoint> {
        self.pixel_override
            .or_else(|| self.raster.as_ref().map(|r| r.locate(&self.point)))
    }

    /// View for the map provider: the raster footprint when one is attached,
    /// otherwise a default-sized view centered on the point.
    pub fn map_view(&self) -> MapView {
        let view = match &self.raster {
            Some(r) => MapView::new(r.center, r.zoom, r.width, r.height, r.tile_size),
            None => MapView::new(
                self.point,
                DEFAULT_ZOOM,
                DEFAULT_RASTER_SIZE,
                DEFAULT_RASTER_SIZE,
                TILE_SIZE,
            ),
        };
        view.with_marker(self.point)
    }

    pub fn stage(&self, id: StageId) -> &StageState {
        &self.stages[id.order()]
    }

    pub fn status(&self, id: StageId) -> StageStatus {
        self.stage(id).status
    }

    pub fn artifact(&self, id: StageId) -> Option<&Artifact> {
        self.stage(id).artifact.as_ref()
    }

    /// Artifacts of every succeeded stage, in pipeline order.
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.stages.iter().filter_map(|s| s.artifact.as_ref())
    }

    pub fn parameter(&self, id: StageId, name: &str) -> Result<f64> {
        id.definition().param(name)?;
        self.stage(id)
            .param(name)
            .map(|p| p.value)
            .ok_or_else(|| PipelineError::UnknownParameter {
                stage: id,
                name: name.to_string(),
            })
    }

    /// Change a stage parameter. Returns `false` when the value is unchanged,
    /// in which case nothing is invalidated. A changed parameter on a
    /// succeeded stage downgrades that stage and every later one.
    pub fn set_parameter(&mut self, id: StageId, name: &str, value: f64) -> Result<bool> {
        let spec = id.definition().param(name)?;
        let value = spec.validate(id, value)?;

        let state = &mut self.stages[id.order()];
        let param = state
            .params
            .iter_mut()
            .find(|p| p.spec.name == name)
            .ok_or_else(|| PipelineError::UnknownParameter {
                stage: id,
                name: name.to_string(),
            })?;
        if param.value == value {
            return Ok(false);
        }
        param.value = value;
        param.dirty = true;

        if state.status == StageStatus::Succeeded {
            info!(stage = %id, param = name, value, "Parameter changed, invalidating downstream");
            self.invalidate_from(id);
        }
        Ok(true)
    }

    /// [`set_parameter`](Self::set_parameter) with the stage given by name.
    pub fn set_parameter_by_name(&mut self, stage: &str, name: &str, value: f64) -> Result<bool> {
        let id: StageId = stage.parse()?;
        self.set_parameter(id, name, value)
    }

    /// First earlier stage that has not succeeded.
    pub fn blocking_stage(&self, id: StageId) -> Option<StageId> {
        StageId::ALL[..id.order()]
            .iter()
            .copied()
            .find(|s| self.status(*s) != StageStatus::Succeeded)
    }

    /// True iff every earlier stage has succeeded.
    pub fn is_ready(&self, id: StageId) -> bool {
        self.blocking_stage(id).is_none()
    }

    pub fn ensure_ready(&self, id: StageId) -> Result<()> {
        match self.blocking_stage(id) {
            Some(blocking) => Err(PipelineError::NotReady {
                stage: id,
                blocking,
            }),
            None => Ok(()),
        }
    }

    /// Furthest reachable stage: the first one that has not succeeded.
    pub fn current_stage(&self) -> Option<StageId> {
        StageId::ALL
            .into_iter()
            .find(|s| self.status(*s) != StageStatus::Succeeded)
    }

    pub fn is_complete(&self) -> bool {
        self.current_stage().is_none()
    }

    /// Start a run. Re-entering a succeeded stage discards its artifact and
    /// downgrades every later stage.
    pub fn mark_running(&mut self, id: StageId) -> Result<()> {
        self.ensure_ready(id)?;
        match self.status(id) {
            StageStatus::Running => {
                return Err(transition(id, StageStatus::Running, StageStatus::Running));
            }
            StageStatus::Succeeded => {
                if let Some(next) = id.next() {
                    self.invalidate_from(next);
                }
            }
            StageStatus::NotStarted | StageStatus::Failed => {}
        }
        let state = &mut self.stages[id.order()];
        state.status = StageStatus::Running;
        state.artifact = None;
        state.failure = None;
        state.started_at = Some(Instant::now());
        debug!(stage = %id, "Stage running");
        Ok(())
    }

    /// Record success and mint the stage's new artifact. Only legal while
    /// running. Earlier stages are untouched.
    pub fn mark_succeeded(&mut self, id: StageId) -> Result<Artifact> {
        let status = self.status(id);
        if status != StageStatus::Running {
            return Err(transition(id, status, StageStatus::Succeeded));
        }
        let definition = id.definition();
        let artifact = Artifact {
            stage: id,
            name: definition.artifact,
            kind: definition.kind,
            preview: definition.preview,
            generation: self.next_generation,
            generated_at: SystemTime::now(),
        };
        self.next_generation += 1;

        let state = &mut self.stages[id.order()];
        state.status = StageStatus::Succeeded;
        state.artifact = Some(artifact.clone());
        state.failure = None;
        state.started_at = None;
        for param in &mut state.params {
            param.dirty = false;
        }
        debug!(stage = %id, generation = artifact.generation, "Stage succeeded");
        Ok(artifact)
    }

    /// Record a failed run. Only legal while running.
    pub fn mark_failed(&mut self, id: StageId, reason: impl Into<String>) -> Result<()> {
        let status = self.status(id);
        if status != StageStatus::Running {
            return Err(transition(id, status, StageStatus::Failed));
        }
        let state = &mut self.stages[id.order()];
        state.status = StageStatus::Failed;
        state.failure = Some(reason.into());
        state.started_at = None;
        debug!(stage = %id, "Stage failed");
        Ok(())
    }

    /// Downgrade `id` and every later stage to not-started, discarding their
    /// artifacts.
    pub fn invalidate_from(&mut self, id: StageId) {
        for stage in id.remaining() {
            self.stages[stage.order()].clear();
        }
    }

    /// Force every stage that has been running longer than `limit` to
    /// failed. Returns the stages that were forced.
    pub fn fail_overdue(&mut self, limit: Duration) -> Vec<StageId> {
        let mut forced = Vec::new();
        for id in StageId::ALL {
            let state = &mut self.stages[id.order()];
            let overdue = state.status == StageStatus::Running
                && state.started_at.is_some_and(|t| t.elapsed() >= limit);
            if overdue {
                warn!(stage = %id, ?limit, "Stage exceeded its time limit");
                state.status = StageStatus::Failed;
                state.failure = Some(format!("timed out after {}s", limit.as_secs_f64()));
                state.started_at = None;
                forced.push(id);
            }
        }
        forced
    }

    fn reset_stages(&mut self) {
        for state in &mut self.stages {
            state.reset();
        }
    }
}

fn transition(stage: StageId, from: StageStatus, to: StageStatus) -> PipelineError {
    PipelineError::InvalidTransition {
        stage,
        from: from.as_str(),
        to: to.as_str(),
    }
}
