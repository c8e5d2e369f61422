use anyhow::Result;
use clap::Args;
use fieldtrace_core::consts::{DEFAULT_RASTER_SIZE, DEFAULT_ZOOM, TILE_SIZE};
use fieldtrace_core::geo::{pixel_offset, pixel_point, GeoPoint, PixelPoint};

#[derive(Args)]
pub struct ProjectArgs {
    /// Latitude of the selected point
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude of the selected point
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,

    /// Raster center latitude (defaults to the selected point)
    #[arg(long, allow_hyphen_values = true)]
    pub center_lat: Option<f64>,

    /// Raster center longitude (defaults to the selected point)
    #[arg(long, allow_hyphen_values = true)]
    pub center_lng: Option<f64>,

    /// Zoom level of the raster
    #[arg(long, default_value_t = DEFAULT_ZOOM)]
    pub zoom: u8,

    /// Raster width in pixels
    #[arg(long, default_value_t = DEFAULT_RASTER_SIZE)]
    pub width: u32,

    /// Raster height in pixels
    #[arg(long, default_value_t = DEFAULT_RASTER_SIZE)]
    pub height: u32,

    /// Convert a click on a scaled preview instead: "x,y,display_w,display_h"
    #[arg(long)]
    pub click: Option<String>,
}

pub fn run(args: &ProjectArgs) -> Result<()> {
    let selected = GeoPoint::new(args.lat, args.lng)?;
    let center = match (args.center_lat, args.center_lng) {
        (Some(lat), Some(lng)) => GeoPoint::new(lat, lng)?,
        (None, None) => selected,
        _ => anyhow::bail!("--center-lat and --center-lng must be given together"),
    };

    let projected = selected.projected();
    let offset = pixel_offset(&selected, &center, args.zoom, TILE_SIZE);
    let pixel = pixel_point(
        &selected,
        &center,
        args.zoom,
        TILE_SIZE,
        args.width,
        args.height,
    );
    let (x, y) = pixel.rounded();

    println!("Point:       {selected}");
    println!("Center:      {center}");
    println!("Projected:   ({:.9}, {:.9})", projected.x, projected.y);
    println!("Offset:      ({:.2}, {:.2}) px at zoom {}", offset.dx, offset.dy, args.zoom);
    println!("Pixel:       ({x}, {y}) in {}x{}", args.width, args.height);
    if !pixel.is_within(args.width, args.height) {
        println!("Warning:     point lies outside the raster");
    }

    if let Some(ref click) = args.click {
        let parts: Vec<f64> = click
            .split(',')
            .map(|s| s.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()?;
        let [cx, cy, dw, dh] = parts[..] else {
            anyhow::bail!("--click expects four comma-separated numbers");
        };
        let natural = PixelPoint::from_display_click(cx, cy, (dw, dh), (args.width, args.height));
        println!("Click:       ({}, {}) natural pixels", natural.x, natural.y);
    }

    Ok(())
}
