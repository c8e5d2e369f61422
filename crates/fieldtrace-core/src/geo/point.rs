use serde::Serialize;

use crate::error::{PipelineError, Result};

/// A validated geographic coordinate in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Validate and build a point. Latitude must lie in [-90, 90] and
    /// longitude in [-180, 180]; NaN is rejected.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let lat_ok = (-90.0..=90.0).contains(&latitude);
        let lng_ok = (-180.0..=180.0).contains(&longitude);
        if !lat_ok || !lng_ok {
            return Err(PipelineError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Build a point by clamping both components into range.
    pub(crate) fn clamped(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: super::projection::clamp_latitude(latitude),
            longitude: longitude.clamp(-180.0, 180.0),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Normalized Web Mercator position of this point.
    pub fn projected(&self) -> ProjectedPoint {
        super::projection::project(self.latitude, self.longitude)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Normalized Web Mercator coordinate, both axes in [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

/// Pixel delta between two projected points at a given zoom.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PixelOffset {
    pub dx: f64,
    pub dy: f64,
}

/// Position inside a raster image, origin top-left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Nearest whole pixel, as sent to the processing service.
    pub fn rounded(&self) -> (i64, i64) {
        (self.x.round() as i64, self.y.round() as i64)
    }

    /// Convert a click on a scaled preview into natural raster pixels.
    pub fn from_display_click(
        click_x: f64,
        click_y: f64,
        display: (f64, f64),
        natural: (u32, u32),
    ) -> Self {
        let scale_x = natural.0 as f64 / display.0;
        let scale_y = natural.1 as f64 / display.1;
        Self {
            x: (click_x * scale_x).round(),
            y: (click_y * scale_y).round(),
        }
    }

    /// Rounded pixel, if it names a column and row of a `width` x `height`
    /// raster. The check runs on the rounded value because that is what the
    /// service receives.
    pub fn rounded_within(&self, width: u32, height: u32) -> Option<(i64, i64)> {
        let (x, y) = self.rounded();
        let inside = (0..i64::from(width)).contains(&x) && (0..i64::from(height)).contains(&y);
        inside.then_some((x, y))
    }

    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.rounded_within(width, height).is_some()
    }
}
