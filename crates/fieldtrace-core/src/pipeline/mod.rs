mod orchestrator;
mod runner;
mod types;

pub use orchestrator::PipelineOrchestrator;
pub use runner::{build_request, StageRunner};
pub use types::{
    BatchReport, CancelToken, NoOpObserver, OrchestratorState, PipelineObserver, StepReport,
};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
