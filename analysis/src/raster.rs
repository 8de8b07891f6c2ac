use std::path::Path;

use image::{ImageBuffer, Pixel, RgbImage, RgbaImage};
use structures::Coord;

use crate::errors::AnalysisError;

pub(crate) fn load_rgb(path: &Path) -> Result<RgbImage, AnalysisError> {
    image::open(path)
        .map(|image| image.to_rgb8())
        .map_err(|source| AnalysisError::Image {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn load_rgba(path: &Path) -> Result<RgbaImage, AnalysisError> {
    image::open(path)
        .map(|image| image.to_rgba8())
        .map_err(|source| AnalysisError::Image {
            path: path.to_path_buf(),
            source,
        })
}

/// `None` outside the image.
pub(crate) fn pixel_at<P: Pixel>(image: &ImageBuffer<P, Vec<P::Subpixel>>, coord: Coord) -> Option<P> {
    if coord.x < image.width() && coord.y < image.height() {
        Some(*image.get_pixel(coord.x, coord.y))
    } else {
        None
    }
}
