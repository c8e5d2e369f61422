use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::StageError;
use crate::session::Artifact;
use crate::stages::StageId;

/// Orchestrator state machine.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum OrchestratorState {
    #[default]
    Idle,
    Advancing(StageId),
    BatchRunning(StageId),
    Complete,
    Halted { stage: StageId, error: StageError },
}

impl OrchestratorState {
    /// True while a stage invocation is in flight.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Advancing(_) | Self::BatchRunning(_))
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Advancing(stage) => write!(f, "Advancing {stage}"),
            Self::BatchRunning(from) => write!(f, "Running from {from}"),
            Self::Complete => write!(f, "Complete"),
            Self::Halted { stage, error } => write!(f, "Halted at {stage}: {}", error.message),
        }
    }
}

/// Result of a single successful `advance`.
#[derive(Clone, Debug, PartialEq)]
pub struct StepReport {
    pub artifact: Artifact,
    /// Stage that became runnable, if any.
    pub unlocked: Option<StageId>,
}

/// Stages run by `run_remaining`: all of them on success, or those before
/// the failing stage when the batch halts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub artifacts: Vec<Artifact>,
    pub unlocked: Vec<StageId>,
}

/// Receives pipeline events for display.
///
/// Implementors drive progress bars, previews, or button states. All methods
/// have default no-op implementations.
pub trait PipelineObserver: Send + Sync {
    /// A stage invocation is about to be sent.
    fn stage_started(&self, _stage: StageId) {}

    /// A stage succeeded and its artifact can be fetched.
    fn artifact_ready(&self, _artifact: &Artifact) {}

    /// These stages became runnable.
    fn stages_unlocked(&self, _stages: &[StageId]) {}

    /// A stage failed; the pipeline is halted.
    fn stage_failed(&self, _error: &StageError) {}

    /// Every stage has succeeded.
    fn pipeline_complete(&self) {}
}

/// Observer that ignores every event.
pub struct NoOpObserver;
impl PipelineObserver for NoOpObserver {}

/// Caller-held flag that abandons a run.
///
/// A batch stops before its next stage once cancelled, and a reply that
/// arrives after cancellation is discarded rather than recorded.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
