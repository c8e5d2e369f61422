use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{PipelineError, Result, StageError};
use crate::geo::{GeoPoint, PixelPoint};
use crate::service::ProcessingService;
use crate::session::{Artifact, RasterContext, Session};
use crate::stages::StageId;

use super::lock;
use super::runner::StageRunner;
use super::types::{
    BatchReport, CancelToken, NoOpObserver, OrchestratorState, PipelineObserver, StepReport,
};

/// Drives a session through its stages, one invocation at a time.
///
/// Lock order is always state, then session. The session lock is never held
/// while waiting on the state lock.
pub struct PipelineOrchestrator {
    session: Mutex<Session>,
    state: Mutex<OrchestratorState>,
    service: Arc<dyn ProcessingService>,
    observer: Arc<dyn PipelineObserver>,
    cancel: CancelToken,
}

/// Marks the orchestrator busy for its lifetime. Dropped without an explicit
/// outcome (a panic in the service), it returns the orchestrator to `Idle`.
struct RunGuard<'a> {
    state: &'a Mutex<OrchestratorState>,
    previous: Option<OrchestratorState>,
}

impl RunGuard<'_> {
    fn finish(mut self, next: OrchestratorState) {
        self.previous = None;
        *lock(self.state) = next;
    }

    /// Undo the transition for a run rejected before any stage executed.
    fn restore(mut self) {
        if let Some(previous) = self.previous.take() {
            *lock(self.state) = previous;
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.previous.is_some() {
            let mut state = lock(self.state);
            if state.is_running() {
                warn!("Stage run abandoned");
                *state = OrchestratorState::Idle;
            }
        }
    }
}

impl PipelineOrchestrator {
    pub fn new(session: Session, service: Arc<dyn ProcessingService>) -> Self {
        Self {
            session: Mutex::new(session),
            state: Mutex::new(OrchestratorState::Idle),
            service,
            observer: Arc::new(NoOpObserver),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> OrchestratorState {
        lock(&self.state).clone()
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.state).is_running()
    }

    /// Token that abandons the current run when cancelled. It is re-armed at
    /// the start of every run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Read the session.
    pub fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&*lock(&self.session))
    }

    pub fn into_session(self) -> Session {
        self.session
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn current_stage(&self) -> Option<StageId> {
        lock(&self.session).current_stage()
    }

    /// Retrieval URL for `artifact`, when the service serves artifacts over
    /// HTTP.
    pub fn artifact_url(&self, artifact: &Artifact) -> Option<String> {
        self.service.base_url().map(|base| artifact.url(base))
    }

    /// Apply a session mutation unless a stage is in flight.
    fn edit<R>(
        &self,
        f: impl FnOnce(&mut Session, &mut OrchestratorState) -> Result<R>,
    ) -> Result<R> {
        let mut state = lock(&self.state);
        if state.is_running() {
            return Err(PipelineError::Busy);
        }
        let mut session = lock(&self.session);
        f(&mut *session, &mut *state)
    }

    pub fn select_point(&self, point: GeoPoint) -> Result<()> {
        self.edit(|session, state| {
            session.select_point(point);
            *state = OrchestratorState::Idle;
            Ok(())
        })
    }

    pub fn attach_raster(&self, raster: RasterContext) -> Result<()> {
        self.edit(|session, state| {
            session.attach_raster(raster);
            *state = OrchestratorState::Idle;
            Ok(())
        })
    }

    pub fn set_pixel_point(&self, pixel: PixelPoint) -> Result<()> {
        self.edit(|session, state| {
            session.set_pixel_point(pixel)?;
            *state = OrchestratorState::Idle;
            Ok(())
        })
    }

    /// Change a stage parameter. Earlier artifacts are kept; the stage and
    /// later ones are downgraded if it had succeeded.
    pub fn set_parameter(&self, stage: StageId, name: &str, value: f64) -> Result<bool> {
        self.edit(|session, state| {
            let changed = session.set_parameter(stage, name, value)?;
            if changed && *state == OrchestratorState::Complete && !session.is_complete() {
                *state = OrchestratorState::Idle;
            }
            Ok(changed)
        })
    }

    /// Force stages running longer than `limit` to failed. Allowed while
    /// busy: a late reply for a forced stage is discarded by the runner.
    pub fn fail_overdue(&self, limit: Duration) -> Vec<StageId> {
        lock(&self.session).fail_overdue(limit)
    }

    fn begin(&self, next: OrchestratorState) -> Result<RunGuard<'_>> {
        let mut state = lock(&self.state);
        if state.is_running() {
            return Err(PipelineError::Busy);
        }
        let previous = std::mem::replace(&mut *state, next);
        self.cancel.reset();
        Ok(RunGuard {
            state: &self.state,
            previous: Some(previous),
        })
    }

    fn halted(stage: StageId, error: &StageError) -> OrchestratorState {
        OrchestratorState::Halted {
            stage,
            error: error.clone(),
        }
    }

    /// Run exactly one stage. On success the next stage is unlocked.
    pub fn advance(&self, stage: StageId) -> Result<StepReport> {
        let guard = self.begin(OrchestratorState::Advancing(stage))?;
        let ready = lock(&self.session).ensure_ready(stage);
        if let Err(e) = ready {
            guard.restore();
            return Err(e);
        }

        self.observer.stage_started(stage);
        let runner = StageRunner::new(self.service.as_ref()).with_cancel(&self.cancel);
        match runner.run(&self.session, stage) {
            Ok(artifact) => {
                self.observer.artifact_ready(&artifact);
                let unlocked = stage.next();
                if let Some(next) = unlocked {
                    self.observer.stages_unlocked(&[next]);
                }
                let complete = lock(&self.session).is_complete();
                if complete {
                    guard.finish(OrchestratorState::Complete);
                    self.observer.pipeline_complete();
                } else {
                    guard.finish(OrchestratorState::Idle);
                }
                Ok(StepReport { artifact, unlocked })
            }
            Err(PipelineError::Stage(error)) => {
                self.observer.stage_failed(&error);
                guard.finish(Self::halted(stage, &error));
                Err(error.into())
            }
            Err(other) => {
                guard.restore();
                Err(other)
            }
        }
    }

    /// Run `from` and every later stage in order, stopping at the first
    /// failure. Artifacts produced before the failure are kept and returned
    /// in [`PipelineError::Halted`], and a later call from the failed stage
    /// does not re-run earlier ones.
    pub fn run_remaining(&self, from: StageId) -> Result<BatchReport> {
        let guard = self.begin(OrchestratorState::BatchRunning(from))?;
        let ready = lock(&self.session).ensure_ready(from);
        if let Err(e) = ready {
            guard.restore();
            return Err(e);
        }

        info!(from = %from, "Running remaining stages");
        let runner = StageRunner::new(self.service.as_ref()).with_cancel(&self.cancel);
        let mut report = BatchReport::default();

        for stage in from.remaining() {
            if self.cancel.is_cancelled() {
                info!(stage = %stage, "Batch cancelled");
                guard.finish(OrchestratorState::Idle);
                return Err(PipelineError::Cancelled { stage });
            }

            self.observer.stage_started(stage);
            match runner.run(&self.session, stage) {
                Ok(artifact) => {
                    self.observer.artifact_ready(&artifact);
                    if let Some(next) = stage.next() {
                        self.observer.stages_unlocked(&[next]);
                        report.unlocked.push(next);
                    }
                    report.artifacts.push(artifact);
                }
                Err(PipelineError::Stage(error)) => {
                    warn!(
                        stage = %stage,
                        completed = report.artifacts.len(),
                        "Batch halted"
                    );
                    self.observer.stage_failed(&error);
                    guard.finish(Self::halted(stage, &error));
                    return Err(PipelineError::Halted {
                        error,
                        completed: Box::new(report),
                    });
                }
                Err(other) => {
                    if report.artifacts.is_empty() {
                        guard.restore();
                    } else {
                        guard.finish(OrchestratorState::Idle);
                    }
                    return Err(other);
                }
            }
        }

        info!(stages = report.artifacts.len(), "Pipeline complete");
        guard.finish(OrchestratorState::Complete);
        self.observer.pipeline_complete();
        Ok(report)
    }
}
