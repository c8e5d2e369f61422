pub mod map_view;
pub mod point;
pub mod projection;

pub use map_view::{static_map_url, GeoBounds, MapView};
pub use point::{GeoPoint, PixelOffset, PixelPoint, ProjectedPoint};
pub use projection::{
    clamp_latitude, latitude_from_y, pixel_offset, pixel_point, project, unclamped_y, unproject,
};
