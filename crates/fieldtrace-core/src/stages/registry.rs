use crate::error::{PipelineError, Result};

use super::StageId;

/// Whether a parameter is sent as a whole number or a decimal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    Float,
}

/// Declaration of one tunable stage parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    /// Form field name the processing service expects.
    pub field: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub kind: ParamKind,
}

impl ParamSpec {
    /// Check `value` against the bounds and kind of this parameter.
    pub fn validate(&self, stage: StageId, value: f64) -> Result<f64> {
        if !(self.min..=self.max).contains(&value) {
            return Err(PipelineError::OutOfRange {
                stage,
                name: self.name.to_string(),
                value,
                min: self.min,
                max: self.max,
            });
        }
        if self.kind == ParamKind::Integer && value.fract() != 0.0 {
            return Err(PipelineError::NotAnInteger {
                stage,
                name: self.name.to_string(),
                value,
            });
        }
        Ok(value)
    }

    /// Wire representation of `value`.
    pub fn format(&self, value: f64) -> String {
        match self.kind {
            ParamKind::Integer => format!("{}", value.round() as i64),
            ParamKind::Float => format!("{value}"),
        }
    }
}

/// What a stage's artifact is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    Document,
}

/// Request fields derived from the session's geometry rather than from
/// stage parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryInput {
    None,
    /// Raster pixel of the selected point, plus the raster itself.
    PixelPoint,
    /// Selected point and raster zoom in geographic terms.
    MapCenter,
}

/// How a stage's operation is requested from the processing service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestMethod {
    /// Plain `GET` with no fields.
    Get,
    /// `POST` with url-encoded form fields.
    Form,
    /// `POST` as `multipart/form-data`, the raster in the `image` part.
    Upload,
}

/// One row of the stage table.
#[derive(Debug)]
pub struct StageDefinition {
    pub id: StageId,
    pub title: &'static str,
    /// Processing service route invoked for this stage.
    pub operation: &'static str,
    /// Well-known artifact name returned on success.
    pub artifact: &'static str,
    pub kind: ArtifactKind,
    /// Preview image accompanying a document artifact.
    pub preview: Option<&'static str>,
    pub params: &'static [ParamSpec],
    pub geometry: GeometryInput,
    pub method: RequestMethod,
}

impl StageDefinition {
    pub fn param(&self, name: &str) -> Result<&'static ParamSpec> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| PipelineError::UnknownParameter {
                stage: self.id,
                name: name.to_string(),
            })
    }
}

static CROP_PARAMS: [ParamSpec; 1] = [ParamSpec {
    name: "radius_size",
    field: "radiusSize",
    default: 50.0,
    min: 10.0,
    max: 200.0,
    kind: ParamKind::Integer,
}];

static DENSITY_PARAMS: [ParamSpec; 1] = [ParamSpec {
    name: "window_size",
    field: "windowSize",
    default: 5.0,
    min: 1.0,
    max: 50.0,
    kind: ParamKind::Integer,
}];

static SMOOTHING_PARAMS: [ParamSpec; 1] = [ParamSpec {
    name: "epsilon_factor",
    field: "epsilonFactor",
    default: 0.001,
    min: 0.0001,
    max: 0.05,
    kind: ParamKind::Float,
}];

static MAP_PARAMS: [ParamSpec; 1] = [ParamSpec {
    name: "radius_meters",
    field: "radiusMeters",
    default: 50.0,
    min: 1.0,
    max: 1000.0,
    kind: ParamKind::Float,
}];

static REGISTRY: [StageDefinition; 8] = [
    StageDefinition {
        id: StageId::Crop,
        title: "Mark point",
        operation: "process_step2",
        artifact: "step2_processed_image.jpg",
        kind: ArtifactKind::Image,
        preview: None,
        params: &CROP_PARAMS,
        geometry: GeometryInput::PixelPoint,
        method: RequestMethod::Upload,
    },
    StageDefinition {
        id: StageId::ColorMask,
        title: "Green mask",
        operation: "process_step3",
        artifact: "step3_green_mask.jpg",
        kind: ArtifactKind::Image,
        preview: None,
        params: &[],
        geometry: GeometryInput::None,
        method: RequestMethod::Get,
    },
    StageDefinition {
        id: StageId::DensityMask,
        title: "Density mask",
        operation: "process_step4",
        artifact: "step4_density_mask.jpg",
        kind: ArtifactKind::Image,
        preview: None,
        params: &DENSITY_PARAMS,
        geometry: GeometryInput::None,
        method: RequestMethod::Form,
    },
    StageDefinition {
        id: StageId::ShapeExtraction,
        title: "Main shape",
        operation: "process_step5",
        artifact: "step5_main_shape.jpg",
        kind: ArtifactKind::Image,
        preview: None,
        params: &[],
        geometry: GeometryInput::None,
        method: RequestMethod::Get,
    },
    StageDefinition {
        id: StageId::Smoothing,
        title: "Smooth edges",
        operation: "process_step6",
        artifact: "step6_smoothed_shape.jpg",
        kind: ArtifactKind::Image,
        preview: None,
        params: &SMOOTHING_PARAMS,
        geometry: GeometryInput::None,
        method: RequestMethod::Form,
    },
    StageDefinition {
        id: StageId::Isolation,
        title: "Masked field",
        operation: "process_step7",
        artifact: "step7_masked_field.jpg",
        kind: ArtifactKind::Image,
        preview: None,
        params: &[],
        geometry: GeometryInput::None,
        method: RequestMethod::Get,
    },
    StageDefinition {
        id: StageId::BoundaryExport,
        title: "Boundary export",
        operation: "process_step8",
        artifact: "field_boundary.geojson",
        kind: ArtifactKind::Document,
        preview: Some("step8_final_with_boundary.jpg"),
        params: &[],
        geometry: GeometryInput::None,
        method: RequestMethod::Get,
    },
    StageDefinition {
        id: StageId::MapRender,
        title: "Map overlay",
        operation: "process_step9",
        artifact: "step9_map_overlay.geojson",
        kind: ArtifactKind::Document,
        preview: None,
        params: &MAP_PARAMS,
        geometry: GeometryInput::MapCenter,
        method: RequestMethod::Form,
    },
];

/// All stage definitions in pipeline order.
pub fn definitions() -> &'static [StageDefinition] {
    &REGISTRY
}

/// Definition for a stage name such as `density_mask`.
pub fn lookup(name: &str) -> Result<&'static StageDefinition> {
    let id: StageId = name.parse()?;
    Ok(id.definition())
}
