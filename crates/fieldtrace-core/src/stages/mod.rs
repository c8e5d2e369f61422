mod registry;

pub use registry::{
    definitions, lookup, ArtifactKind, GeometryInput, ParamKind, ParamSpec, RequestMethod,
    StageDefinition,
};

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Pipeline stage identifier. Declaration order is execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Crop,
    ColorMask,
    DensityMask,
    ShapeExtraction,
    Smoothing,
    Isolation,
    BoundaryExport,
    MapRender,
}

impl StageId {
    pub const ALL: [Self; 8] = [
        Self::Crop,
        Self::ColorMask,
        Self::DensityMask,
        Self::ShapeExtraction,
        Self::Smoothing,
        Self::Isolation,
        Self::BoundaryExport,
        Self::MapRender,
    ];

    pub const FIRST: Self = Self::Crop;
    pub const LAST: Self = Self::MapRender;

    /// Zero-based position in the pipeline.
    pub const fn order(self) -> usize {
        self as usize
    }

    pub fn from_order(order: usize) -> Option<Self> {
        Self::ALL.get(order).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_order(self.order() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        self.order().checked_sub(1).and_then(Self::from_order)
    }

    /// This stage and every later one, in order.
    pub fn remaining(self) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().skip(self.order())
    }

    pub fn definition(self) -> &'static StageDefinition {
        &definitions()[self.order()]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crop => "crop",
            Self::ColorMask => "color_mask",
            Self::DensityMask => "density_mask",
            Self::ShapeExtraction => "shape_extraction",
            Self::Smoothing => "smoothing",
            Self::Isolation => "isolation",
            Self::BoundaryExport => "boundary_export",
            Self::MapRender => "map_render",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| PipelineError::UnknownStage(s.to_string()))
    }
}
