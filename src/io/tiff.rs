use std::path::Path;

use image::{DynamicImage, GenericImageView};
use ndarray::Array2;

use super::Result;

/// Loads a grayscale TIFF image as `(rows, columns)`
///
/// 8 and 16 bits images keep their raw pixel values, any other color type is
/// converted to normalized luma.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let image = image::open(path)?;
    let (width, height) = image.dimensions();
    let shape = (height as usize, width as usize);
    let values: Vec<f64> = match image {
        DynamicImage::ImageLuma8(buffer) => buffer.into_raw().into_iter().map(f64::from).collect(),
        DynamicImage::ImageLuma16(buffer) => {
            buffer.into_raw().into_iter().map(f64::from).collect()
        }
        other => {
            log::debug!("converting {:?} to luma", other.color());
            other.to_luma32f().into_raw().into_iter().map(f64::from).collect()
        }
    };
    Ok(Array2::from_shape_vec(shape, values)?)
}
