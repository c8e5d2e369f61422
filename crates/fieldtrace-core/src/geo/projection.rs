use std::f64::consts::PI;

use tracing::debug;

use crate::consts::LATITUDE_LIMIT;

use super::point::{GeoPoint, PixelOffset, PixelPoint, ProjectedPoint};

/// Clamp a latitude into the open interval the projection is defined on.
pub fn clamp_latitude(latitude: f64) -> f64 {
    latitude.clamp(-LATITUDE_LIMIT, LATITUDE_LIMIT)
}

/// Mercator `y` before clamping to [0, 1].
pub fn unclamped_y(latitude: f64) -> f64 {
    let sin_lat = (clamp_latitude(latitude) * PI / 180.0).sin();
    0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI)
}

/// Inverse of [`unclamped_y`]: latitude in degrees for a Mercator `y`.
pub fn latitude_from_y(y: f64) -> f64 {
    (2.0 * ((0.5 - y) * 2.0 * PI).exp().atan() - PI / 2.0) * 180.0 / PI
}

/// Project a coordinate to normalized Web Mercator space.
pub fn project(latitude: f64, longitude: f64) -> ProjectedPoint {
    ProjectedPoint {
        x: (longitude + 180.0) / 360.0,
        y: unclamped_y(latitude).clamp(0.0, 1.0),
    }
}

/// Geographic coordinate of a normalized projected point. Inputs outside
/// [0, 1] are clamped first.
pub fn unproject(point: ProjectedPoint) -> GeoPoint {
    let x = point.x.clamp(0.0, 1.0);
    let y = point.y.clamp(0.0, 1.0);
    GeoPoint::clamped(latitude_from_y(y), x * 360.0 - 180.0)
}

fn world_scale(zoom: u8, tile_size: u32) -> f64 {
    tile_size as f64 * 2f64.powi(zoom as i32)
}

/// Pixel offset of `selected` relative to `image_center` at `zoom`.
pub fn pixel_offset(
    selected: &GeoPoint,
    image_center: &GeoPoint,
    zoom: u8,
    tile_size: u32,
) -> PixelOffset {
    let a = selected.projected();
    let b = image_center.projected();
    let scale = world_scale(zoom, tile_size);
    PixelOffset {
        dx: (a.x - b.x) * scale,
        dy: (a.y - b.y) * scale,
    }
}

/// Pixel location of `selected` inside a `width` x `height` raster centered
/// on `image_center`.
pub fn pixel_point(
    selected: &GeoPoint,
    image_center: &GeoPoint,
    zoom: u8,
    tile_size: u32,
    width: u32,
    height: u32,
) -> PixelPoint {
    let offset = pixel_offset(selected, image_center, zoom, tile_size);
    let point = PixelPoint {
        x: width as f64 / 2.0 + offset.dx,
        y: height as f64 / 2.0 + offset.dy,
    };
    debug!(
        selected = %selected,
        center = %image_center,
        zoom,
        x = point.x,
        y = point.y,
        "Derived pixel point"
    );
    point
}

/// Convert a pixel delta at `zoom` back to a projected-space delta.
pub(crate) fn projected_span(pixels: f64, zoom: u8, tile_size: u32) -> f64 {
    pixels / world_scale(zoom, tile_size)
}
