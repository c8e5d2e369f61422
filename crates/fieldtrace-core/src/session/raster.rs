use std::io::Cursor;
use std::sync::Arc;

use image::ImageReader;

use crate::consts::{MAX_ZOOM, TILE_SIZE};
use crate::error::{PipelineError, Result};
use crate::geo::{pixel_point, static_map_url, GeoPoint, PixelPoint};

/// Where the first stage's raster comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageSource {
    /// Encoded image uploaded with the request.
    Bytes { data: Arc<[u8]>, mime: &'static str },
    /// Capture URL the processing service downloads itself.
    StaticMapUrl(String),
}

/// The satellite raster the selected point lives in.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterContext {
    pub source: ImageSource,
    pub center: GeoPoint,
    pub zoom: u8,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
}

impl RasterContext {
    pub fn new(
        source: ImageSource,
        center: GeoPoint,
        zoom: u8,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        if zoom > MAX_ZOOM {
            return Err(PipelineError::InvalidZoom {
                zoom,
                max: MAX_ZOOM,
            });
        }
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions { width, height });
        }
        Ok(Self {
            source,
            center,
            zoom,
            width,
            height,
            tile_size: TILE_SIZE,
        })
    }

    /// Raster from an encoded image; dimensions are read from its header.
    pub fn from_image_bytes(data: Vec<u8>, center: GeoPoint, zoom: u8) -> Result<Self> {
        let reader = ImageReader::new(Cursor::new(&data)).with_guessed_format()?;
        let mime = reader
            .format()
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream");
        let (width, height) = reader.into_dimensions()?;
        let source = ImageSource::Bytes {
            data: data.into(),
            mime,
        };
        Self::new(source, center, zoom, width, height)
    }

    /// Raster captured from the static map endpoint.
    pub fn static_map(
        center: GeoPoint,
        zoom: u8,
        width: u32,
        height: u32,
        api_key: &str,
    ) -> Result<Self> {
        let url = static_map_url(&center, zoom, width, height, api_key)?;
        Self::new(ImageSource::StaticMapUrl(url), center, zoom, width, height)
    }

    /// Override the Web Mercator tile size (256 for every common provider).
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size.max(1);
        self
    }

    /// Pixel location of `selected` inside this raster.
    pub fn locate(&self, selected: &GeoPoint) -> PixelPoint {
        pixel_point(
            selected,
            &self.center,
            self.zoom,
            self.tile_size,
            self.width,
            self.height,
        )
    }
}
