use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_CENTER_LATITUDE, DEFAULT_CENTER_LONGITUDE, DEFAULT_RASTER_SIZE,
    DEFAULT_SERVICE_TIMEOUT_SECS, DEFAULT_SERVICE_URL, DEFAULT_ZOOM, TILE_SIZE,
};
use crate::error::{PipelineError, Result};
use crate::geo::GeoPoint;
use crate::session::Session;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub raster: RasterConfig,
    #[serde(default)]
    pub map: MapConfig,
    /// Per-stage parameter overrides: stage id -> parameter name -> value.
    #[serde(default)]
    pub parameters: BTreeMap<String, BTreeMap<String, f64>>,
}

impl WorkflowConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Apply the parameter overrides to `session`. Every value goes through
    /// the normal range checks.
    pub fn apply_parameters(&self, session: &mut Session) -> Result<()> {
        for (stage, values) in &self.parameters {
            for (name, value) in values {
                session.set_parameter_by_name(stage, name, *value)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Per-request timeout. A request that exceeds it fails its stage.
    pub timeout_secs: u64,
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_URL.to_string(),
            timeout_secs: DEFAULT_SERVICE_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_RASTER_SIZE,
            height: DEFAULT_RASTER_SIZE,
            tile_size: TILE_SIZE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub zoom: u8,
}

impl MapConfig {
    pub fn center(&self) -> Result<GeoPoint> {
        GeoPoint::new(self.center_latitude, self.center_longitude)
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_latitude: DEFAULT_CENTER_LATITUDE,
            center_longitude: DEFAULT_CENTER_LONGITUDE,
            zoom: DEFAULT_ZOOM,
        }
    }
}
