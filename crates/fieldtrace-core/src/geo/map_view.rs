use std::f64::consts::PI;

use serde::Serialize;

use crate::consts::{METERS_PER_DEGREE, STATIC_MAP_ENDPOINT};
use crate::error::{PipelineError, Result};

use super::point::{GeoPoint, ProjectedPoint};
use super::projection::{projected_span, unproject};

/// Geographic viewport, south-west and north-east corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GeoBounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl GeoBounds {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.south_west.latitude()..=self.north_east.latitude()).contains(&point.latitude())
            && (self.south_west.longitude()..=self.north_east.longitude())
                .contains(&point.longitude())
    }
}

/// Everything the map provider needs to draw the basemap and marker.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapView {
    pub center: GeoPoint,
    pub zoom: u8,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub marker: Option<GeoPoint>,
}

impl MapView {
    pub fn new(center: GeoPoint, zoom: u8, width: u32, height: u32, tile_size: u32) -> Self {
        Self {
            center,
            zoom,
            width,
            height,
            tile_size,
            marker: None,
        }
    }

    pub fn with_marker(mut self, marker: GeoPoint) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Geographic extent of the viewport.
    pub fn bounds(&self) -> GeoBounds {
        let center = self.center.projected();
        let half_w = projected_span(self.width as f64 / 2.0, self.zoom, self.tile_size);
        let half_h = projected_span(self.height as f64 / 2.0, self.zoom, self.tile_size);
        // Projected y grows southwards.
        let south_west = unproject(ProjectedPoint {
            x: center.x - half_w,
            y: center.y + half_h,
        });
        let north_east = unproject(ProjectedPoint {
            x: center.x + half_w,
            y: center.y - half_h,
        });
        GeoBounds {
            south_west,
            north_east,
        }
    }

    /// Closed polygon approximating a circle of `radius_m` meters around the
    /// marker (or the center when no marker is set). The first vertex is
    /// repeated at the end.
    pub fn selection_ring(&self, radius_m: f64, segments: usize) -> Vec<GeoPoint> {
        let origin = self.marker.unwrap_or(self.center);
        let segments = segments.max(3);
        let cos_lat = (origin.latitude() * PI / 180.0).cos();
        let mut ring: Vec<GeoPoint> = (0..segments)
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / segments as f64;
                let d_lat = radius_m * angle.sin() / METERS_PER_DEGREE;
                let d_lng = radius_m * angle.cos() / (METERS_PER_DEGREE * cos_lat);
                GeoPoint::clamped(origin.latitude() + d_lat, origin.longitude() + d_lng)
            })
            .collect();
        ring.push(ring[0]);
        ring
    }
}

/// URL of a satellite capture centered on `center`, used as the first
/// stage's image source when no file is uploaded.
pub fn static_map_url(
    center: &GeoPoint,
    zoom: u8,
    width: u32,
    height: u32,
    api_key: &str,
) -> Result<String> {
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidDimensions { width, height });
    }
    Ok(format!(
        "{STATIC_MAP_ENDPOINT}?center={},{}&zoom={zoom}&size={width}x{height}&maptype=satellite&key={}",
        center.latitude(),
        center.longitude(),
        urlencoding::encode(api_key)
    ))
}
