use std::sync::Mutex;

use tracing::{info, warn};

use crate::error::{PipelineError, Result, StageError};
use crate::service::{ProcessingService, ServiceReply, StageRequest};
use crate::session::{Artifact, Session, StageStatus};
use crate::stages::{GeometryInput, StageId};

use super::lock;
use super::types::CancelToken;

/// Resolve everything a stage invocation needs from the session: geometry
/// fields, parameter values and, for the upload stage, the raster.
pub fn build_request(session: &Session, stage: StageId) -> Result<StageRequest> {
    let definition = stage.definition();
    let mut fields: Vec<(&'static str, String)> = Vec::new();
    let mut image = None;
    let point = session.point();

    match definition.geometry {
        GeometryInput::None => {}
        GeometryInput::PixelPoint => {
            let raster = session
                .raster()
                .ok_or(PipelineError::MissingRaster { stage })?;
            let pixel = session
                .pixel_point()
                .unwrap_or_else(|| raster.locate(&point));
            let (x, y) = pixel.rounded_within(raster.width, raster.height).ok_or(
                PipelineError::PixelOutOfBounds {
                    x: pixel.x,
                    y: pixel.y,
                    width: raster.width,
                    height: raster.height,
                },
            )?;
            fields.push(("pointX", x.to_string()));
            fields.push(("pointY", y.to_string()));
            fields.push(("latitude", point.latitude().to_string()));
            fields.push(("longitude", point.longitude().to_string()));
            fields.push(("zoom", raster.zoom.to_string()));
            image = Some(raster.source.clone());
        }
        GeometryInput::MapCenter => {
            let view = session.map_view();
            fields.push(("latitude", point.latitude().to_string()));
            fields.push(("longitude", point.longitude().to_string()));
            fields.push(("zoom", view.zoom.to_string()));
        }
    }

    for param in session.stage(stage).params() {
        fields.push((param.spec.field, param.spec.format(param.value)));
    }

    Ok(StageRequest {
        stage,
        operation: definition.operation,
        method: definition.method,
        fields,
        image,
    })
}

/// Executes one stage against the processing service.
///
/// The session lock is released while the request is in flight so observers
/// can see the running status.
pub struct StageRunner<'a> {
    service: &'a dyn ProcessingService,
    cancel: Option<&'a CancelToken>,
}

impl<'a> StageRunner<'a> {
    pub fn new(service: &'a dyn ProcessingService) -> Self {
        Self {
            service,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run `stage`. Local precondition failures (`NotReady`, missing raster)
    /// leave the session untouched; remote failures are recorded on the
    /// stage and returned as [`PipelineError::Stage`].
    pub fn run(&self, session: &Mutex<Session>, stage: StageId) -> Result<Artifact> {
        let request = {
            let mut guard = lock(session);
            guard.ensure_ready(stage)?;
            let request = build_request(&guard, stage)?;
            guard.mark_running(stage)?;
            request
        };

        info!(stage = %stage, operation = request.operation, "Running stage");
        let reply = self.service.invoke(&request);

        let mut guard = lock(session);
        if guard.status(stage) != StageStatus::Running {
            warn!(stage = %stage, "Stage was reset while its request was in flight");
            return Err(StageError::new(
                stage,
                "result discarded: stage was reset while the request was in flight",
            )
            .into());
        }
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            let error = StageError::new(stage, "cancelled while the request was in flight");
            guard.mark_failed(stage, &error.message)?;
            return Err(error.into());
        }

        let message = match reply {
            Ok(ServiceReply::Success) => {
                let artifact = guard.mark_succeeded(stage)?;
                info!(
                    stage = %stage,
                    artifact = artifact.name,
                    generation = artifact.generation,
                    "Stage complete"
                );
                return Ok(artifact);
            }
            Ok(ServiceReply::Failure(message)) => message,
            Err(err) => err.to_string(),
        };

        warn!(stage = %stage, error = %message, "Stage failed");
        guard.mark_failed(stage, &message)?;
        Err(StageError::new(stage, message).into())
    }
}
