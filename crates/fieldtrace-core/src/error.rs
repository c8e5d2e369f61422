use std::fmt;

use thiserror::Error;

use crate::pipeline::BatchReport;
use crate::stages::StageId;

/// A remote processing failure, attributed to the stage that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageError {
    pub stage: StageId,
    pub message: String,
}

impl StageError {
    pub fn new(stage: StageId, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {} failed: {}", self.stage, self.message)
    }
}

impl std::error::Error for StageError {}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Invalid zoom level {zoom} (max {max})")]
    InvalidZoom { zoom: u8, max: u8 },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Pixel ({x}, {y}) lies outside the {width}x{height} raster")]
    PixelOutOfBounds {
        x: f64,
        y: f64,
        width: u32,
        height: u32,
    },

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Stage {stage} has no parameter named {name}")]
    UnknownParameter { stage: StageId, name: String },

    #[error("Parameter {stage}.{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        stage: StageId,
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Parameter {stage}.{name} must be a whole number, got {value}")]
    NotAnInteger {
        stage: StageId,
        name: String,
        value: f64,
    },

    #[error("Stage {stage} is not ready: {blocking} has not succeeded")]
    NotReady { stage: StageId, blocking: StageId },

    #[error("Stage {stage} needs a raster image; none has been supplied")]
    MissingRaster { stage: StageId },

    #[error("Illegal status transition for {stage}: {from} -> {to}")]
    InvalidTransition {
        stage: StageId,
        from: &'static str,
        to: &'static str,
    },

    #[error("Another stage is already running for this session")]
    Busy,

    #[error("Run cancelled before {stage} started")]
    Cancelled { stage: StageId },

    #[error(transparent)]
    Stage(#[from] StageError),

    /// A batch stopped at a failing stage. `completed` holds the artifacts
    /// and unlocked stages produced before it.
    #[error("Pipeline halted after {n} stage(s): {error}", n = .completed.artifacts.len())]
    Halted {
        error: StageError,
        completed: Box<BatchReport>,
    },

    #[error("Config error: {0}")]
    Config(String),
}

impl PipelineError {
    /// The remote failure behind this error, if any.
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            Self::Stage(error) | Self::Halted { error, .. } => Some(error),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
