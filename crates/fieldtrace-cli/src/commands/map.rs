use anyhow::Result;
use clap::Args;
use fieldtrace_core::consts::{DEFAULT_RASTER_SIZE, DEFAULT_RING_SEGMENTS, DEFAULT_ZOOM, TILE_SIZE};
use fieldtrace_core::geo::{static_map_url, GeoPoint, MapView};
use serde_json::json;

#[derive(Args)]
pub struct MapArgs {
    /// Latitude of the selected point
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude of the selected point
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,

    #[arg(long, default_value_t = DEFAULT_ZOOM)]
    pub zoom: u8,

    #[arg(long, default_value_t = DEFAULT_RASTER_SIZE)]
    pub width: u32,

    #[arg(long, default_value_t = DEFAULT_RASTER_SIZE)]
    pub height: u32,

    /// Selection ring radius in meters
    #[arg(long, default_value_t = 50.0)]
    pub radius: f64,

    /// Vertices in the selection ring
    #[arg(long, default_value_t = DEFAULT_RING_SEGMENTS)]
    pub segments: usize,

    /// Include a static map capture URL signed with this key
    #[arg(long)]
    pub static_map_key: Option<String>,
}

pub fn run(args: &MapArgs) -> Result<()> {
    let point = GeoPoint::new(args.lat, args.lng)?;
    let view = MapView::new(point, args.zoom, args.width, args.height, TILE_SIZE).with_marker(point);
    let ring: Vec<[f64; 2]> = view
        .selection_ring(args.radius, args.segments)
        .iter()
        .map(|p| [p.longitude(), p.latitude()])
        .collect();

    let mut out = json!({
        "view": view,
        "bounds": view.bounds(),
        "selection": {
            "type": "Feature",
            "properties": { "radius_m": args.radius },
            "geometry": { "type": "Polygon", "coordinates": [ring] },
        },
    });
    if let Some(ref key) = args.static_map_key {
        let url = static_map_url(&point, args.zoom, args.width, args.height, key)?;
        out["static_map_url"] = json!(url);
    }

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
