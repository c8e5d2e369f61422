/// Web Mercator tile edge length in pixels.
pub const TILE_SIZE: u32 = 256;

/// Edge length of the captured satellite raster (square).
pub const DEFAULT_RASTER_SIZE: u32 = 640;

/// Zoom level the map opens at.
pub const DEFAULT_ZOOM: u8 = 17;

/// Highest zoom level accepted for a raster capture.
pub const MAX_ZOOM: u8 = 22;

/// Latitude of the default map center.
pub const DEFAULT_CENTER_LATITUDE: f64 = 32.901_131_964_746_62;

/// Longitude of the default map center.
pub const DEFAULT_CENTER_LONGITUDE: f64 = 35.120_356_746_684_66;

/// Projection inputs are clamped to +/- this latitude so the log term stays finite.
pub const LATITUDE_LIMIT: f64 = 89.999_999;

/// Approximate meters per degree of latitude, used for small offsets only.
pub const METERS_PER_DEGREE: f64 = 111_111.0;

/// Default number of vertices in a selection ring polygon.
pub const DEFAULT_RING_SEGMENTS: usize = 32;

/// Default processing service endpoint.
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000";

/// Default per-request timeout for processing service calls, in seconds.
/// Image stages routinely take several seconds on a 640x640 raster.
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 60;

/// Body returned by the processing service when a stage succeeds.
pub const SUCCESS_TOKEN: &str = "success";

/// Base URL of the static satellite imagery endpoint.
pub const STATIC_MAP_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/staticmap";
