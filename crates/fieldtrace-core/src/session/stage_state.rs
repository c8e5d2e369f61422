use std::time::Instant;

use crate::stages::{ParamSpec, StageDefinition};

use super::artifact::Artifact;

/// Lifecycle of one stage within a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StageStatus {
    #[default]
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

impl StageStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Current value of one stage parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct StageParameter {
    pub spec: &'static ParamSpec,
    pub value: f64,
    /// True when the value changed since the stage last succeeded.
    pub dirty: bool,
}

/// Per-stage status, parameters and artifact.
#[derive(Clone, Debug)]
pub struct StageState {
    pub(super) status: StageStatus,
    pub(super) params: Vec<StageParameter>,
    pub(super) artifact: Option<Artifact>,
    pub(super) failure: Option<String>,
    pub(super) started_at: Option<Instant>,
}

impl StageState {
    pub(super) fn new(definition: &'static StageDefinition) -> Self {
        Self {
            status: StageStatus::NotStarted,
            params: definition
                .params
                .iter()
                .map(|spec| StageParameter {
                    spec,
                    value: spec.default,
                    dirty: false,
                })
                .collect(),
            artifact: None,
            failure: None,
            started_at: None,
        }
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    /// Message recorded by the last failed run.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn params(&self) -> &[StageParameter] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&StageParameter> {
        self.params.iter().find(|p| p.spec.name == name)
    }

    pub fn is_dirty(&self) -> bool {
        self.params.iter().any(|p| p.dirty)
    }

    pub fn is_complete(&self) -> bool {
        self.status == StageStatus::Succeeded
    }

    /// Drop status and artifact; parameter values and dirty flags survive.
    pub(super) fn clear(&mut self) {
        self.status = StageStatus::NotStarted;
        self.artifact = None;
        self.failure = None;
        self.started_at = None;
    }

    /// Clear status, artifact and dirty flags (new point or new image).
    /// Parameter values are kept.
    pub(super) fn reset(&mut self) {
        self.clear();
        for param in &mut self.params {
            param.dirty = false;
        }
    }
}
