//! Boundary to the external processing service that performs the actual
//! image and geometry work for each stage.

mod http;

pub use http::HttpProcessingService;

use thiserror::Error;

use crate::consts::SUCCESS_TOKEN;
use crate::session::{Artifact, ImageSource};
use crate::stages::{RequestMethod, StageId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("unreadable response: {0}")]
    Body(String),

    #[error("malformed request: {0}")]
    Request(String),
}

/// One stage invocation, fully resolved from the session.
#[derive(Clone, Debug, PartialEq)]
pub struct StageRequest {
    pub stage: StageId,
    pub operation: &'static str,
    pub method: RequestMethod,
    /// Form fields in the order they are sent.
    pub fields: Vec<(&'static str, String)>,
    /// Raster payload; only the upload stage carries one.
    pub image: Option<ImageSource>,
}

impl StageRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome token returned by the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceReply {
    Success,
    Failure(String),
}

impl ServiceReply {
    /// Interpret a response body: exactly `success` (ignoring surrounding
    /// whitespace) is success, anything else is the failure message.
    pub fn from_token(body: &str) -> Self {
        let token = body.trim();
        if token == SUCCESS_TOKEN {
            Self::Success
        } else if token.is_empty() {
            Self::Failure("empty response from processing service".into())
        } else {
            Self::Failure(token.to_string())
        }
    }
}

/// A processing backend with one idempotent operation per stage.
pub trait ProcessingService: Send + Sync {
    /// Run the stage's operation. Remote failures come back as
    /// `Ok(ServiceReply::Failure)`; transport problems as `Err`.
    fn invoke(&self, request: &StageRequest) -> Result<ServiceReply, ServiceError>;

    /// Download an artifact's bytes, keyed by its generation stamp.
    fn fetch_artifact(&self, artifact: &Artifact) -> Result<Vec<u8>, ServiceError>;

    /// Root URL artifacts are served from, if the service is remote.
    fn base_url(&self) -> Option<&str> {
        None
    }
}
