use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use fieldtrace_core::error::StageError;
use fieldtrace_core::geo::GeoPoint;
use fieldtrace_core::pipeline::{PipelineObserver, PipelineOrchestrator};
use fieldtrace_core::service::{ProcessingService, ServiceError, ServiceReply, StageRequest};
use fieldtrace_core::session::{Artifact, ImageSource, RasterContext, Session};
use fieldtrace_core::stages::StageId;

pub const SELECTED_LAT: f64 = 32.9;
pub const SELECTED_LNG: f64 = 35.12;
pub const ZOOM: u8 = 17;

pub fn selected_point() -> GeoPoint {
    GeoPoint::new(SELECTED_LAT, SELECTED_LNG).unwrap()
}

/// 640x640 static-map raster centered on the selected point.
pub fn centered_raster() -> RasterContext {
    RasterContext::new(
        ImageSource::StaticMapUrl("https://example.test/staticmap".into()),
        selected_point(),
        ZOOM,
        640,
        640,
    )
    .unwrap()
}

/// Session with the selected point and a centered raster attached.
pub fn ready_session() -> Session {
    let mut session = Session::new(selected_point());
    session.attach_raster(centered_raster());
    session
}

/// Mark `stage` running then succeeded, bypassing any service.
pub fn succeed(session: &mut Session, stage: StageId) -> Artifact {
    session.mark_running(stage).unwrap();
    session.mark_succeeded(stage).unwrap()
}

/// Succeed every stage before `stage`.
pub fn succeed_until(session: &mut Session, stage: StageId) {
    for id in StageId::ALL.into_iter().take(stage.order()) {
        succeed(session, id);
    }
}

pub fn orchestrator(service: Arc<ScriptedService>) -> PipelineOrchestrator {
    PipelineOrchestrator::new(ready_session(), service)
}

/// Service whose per-stage replies are scripted by the test.
#[derive(Default)]
pub struct ScriptedService {
    requests: Mutex<Vec<StageRequest>>,
    failures: Mutex<HashMap<StageId, String>>,
    transport_failures: Mutex<HashMap<StageId, String>>,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `stage` reply with a failure token.
    pub fn fail(&self, stage: StageId, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(stage, message.to_string());
    }

    /// Make `stage` fail at the transport level.
    pub fn fail_transport(&self, stage: StageId, message: &str) {
        self.transport_failures
            .lock()
            .unwrap()
            .insert(stage, message.to_string());
    }

    pub fn heal(&self, stage: StageId) {
        self.failures.lock().unwrap().remove(&stage);
        self.transport_failures.lock().unwrap().remove(&stage);
    }

    pub fn requests(&self) -> Vec<StageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<StageId> {
        self.requests().iter().map(|r| r.stage).collect()
    }

    pub fn call_count(&self, stage: StageId) -> usize {
        self.calls().iter().filter(|s| **s == stage).count()
    }
}

impl ProcessingService for ScriptedService {
    fn invoke(&self, request: &StageRequest) -> Result<ServiceReply, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(message) = self.transport_failures.lock().unwrap().get(&request.stage) {
            return Err(ServiceError::Transport(message.clone()));
        }
        if let Some(message) = self.failures.lock().unwrap().get(&request.stage) {
            return Ok(ServiceReply::Failure(message.clone()));
        }
        Ok(ServiceReply::Success)
    }

    fn fetch_artifact(&self, artifact: &Artifact) -> Result<Vec<u8>, ServiceError> {
        Ok(format!("{}#{}", artifact.name, artifact.generation).into_bytes())
    }

    fn base_url(&self) -> Option<&str> {
        Some("http://processing.test")
    }
}

/// Service that blocks inside `invoke` until the test releases it.
pub struct GatedService {
    started: Mutex<mpsc::Sender<StageId>>,
    release: Mutex<mpsc::Receiver<()>>,
    calls: AtomicUsize,
}

impl GatedService {
    /// Returns the service, a receiver signalled when a call starts, and a
    /// sender that lets one call finish.
    pub fn new() -> (Arc<Self>, mpsc::Receiver<StageId>, mpsc::Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let service = Arc::new(Self {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
            calls: AtomicUsize::new(0),
        });
        (service, started_rx, release_tx)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProcessingService for GatedService {
    fn invoke(&self, request: &StageRequest) -> Result<ServiceReply, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().send(request.stage).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        Ok(ServiceReply::Success)
    }

    fn fetch_artifact(&self, _artifact: &Artifact) -> Result<Vec<u8>, ServiceError> {
        Ok(Vec::new())
    }
}

/// Observer that records every event as a string.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl PipelineObserver for RecordingObserver {
    fn stage_started(&self, stage: StageId) {
        self.push(format!("started {stage}"));
    }

    fn artifact_ready(&self, artifact: &Artifact) {
        self.push(format!("artifact {}", artifact.name));
    }

    fn stages_unlocked(&self, stages: &[StageId]) {
        for stage in stages {
            self.push(format!("unlocked {stage}"));
        }
    }

    fn stage_failed(&self, error: &StageError) {
        self.push(format!("failed {}", error.stage));
    }

    fn pipeline_complete(&self) {
        self.push("complete".to_string());
    }
}
