use std::fmt;

use ndarray::{s, Array2, ArrayView2};

use super::{MtfError, Result};
use crate::{fit::linregress, spatial};

/// Rectangular region of an image, `(x, y)` is the column and row of its first pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}
impl fmt::Display for CropRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at (x: {}, y: {})",
            self.width, self.height, self.x, self.y
        )
    }
}
impl CropRegion {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
    /// Half-size region centred on an image of shape `(rows, columns)`
    pub fn centred(shape: (usize, usize)) -> Self {
        let (rows, cols) = shape;
        Self::new(cols / 4, rows / 4, cols / 2, rows / 2)
    }
    /// Region from optional bounds, each missing one is taken from [CropRegion::centred]
    pub fn from_options(
        x: Option<usize>,
        y: Option<usize>,
        width: Option<usize>,
        height: Option<usize>,
        shape: (usize, usize),
    ) -> Self {
        let centred = Self::centred(shape);
        if [x, y, width, height].iter().any(Option::is_none) {
            log::info!("Missing crop bounds completed with the centred region {}", centred);
        }
        Self::new(
            x.unwrap_or(centred.x),
            y.unwrap_or(centred.y),
            width.unwrap_or(centred.width),
            height.unwrap_or(centred.height),
        )
    }
    /// Checks that the region is not empty and lies inside an image of shape `(rows, columns)`
    pub fn check(&self, shape: (usize, usize)) -> Result<()> {
        let (rows, cols) = shape;
        if self.width == 0
            || self.height == 0
            || self.x + self.width > cols
            || self.y + self.height > rows
        {
            return Err(MtfError::Crop {
                region: *self,
                shape,
            });
        }
        Ok(())
    }
    pub fn crop<'a>(&self, image: ArrayView2<'a, f64>) -> Result<ArrayView2<'a, f64>> {
        self.check(image.dim())?;
        Ok(image.slice_move(s![
            self.y..self.y + self.height,
            self.x..self.x + self.width
        ]))
    }
}

/// Edge spread function sampled at the distance of every crop pixel to the edge
#[derive(Debug, Clone)]
pub struct EdgeProfile {
    /// Signed distance to the edge in pixels, increasing from the dark side
    pub distances: Vec<f64>,
    /// Raw counts sorted by distance
    pub values: Vec<f64>,
    /// Counts normalized to 0 on the dark side and 1 on the bright side
    pub esf: Vec<f64>,
    /// Edge line `row = intercept + slope*column` in crop pixel coordinates
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Mean count farther than 10 pixels on the bright side
    pub flat_mean: f64,
    /// Mean count farther than 10 pixels on the dark side
    pub dark_mean: f64,
}

impl EdgeProfile {
    /// Extracts the edge spread function of the edge inside `region`
    pub fn extract(image: ArrayView2<f64>, region: CropRegion) -> Result<Self> {
        let crop = region.crop(image)?;

        let binary = match spatial::threshold_mean(crop) {
            Some(threshold) => crop.mapv(|v| v > threshold),
            None => {
                log::warn!(
                    "Could not threshold the original image. Image already binary? Trying with original image."
                );
                crop.mapv(|v| v != 0f64)
            }
        };
        // fills dead pixels, twice for the bigger super-resolution ones
        let dilated = spatial::binary_dilation(&binary, 2);
        let edges = spatial::sobel(&dilated);

        let (line_x, line_y): (Vec<f64>, Vec<f64>) = edges
            .indexed_iter()
            .filter(|(_, v)| **v != 0f64)
            .map(|((row, col), _)| (col as f64, row as f64))
            .unzip();
        if line_x.is_empty() {
            return Err(MtfError::NoEdge);
        }
        let line = linregress(&line_x, &line_y)?;
        let (slope, intercept) = (line.slope, line.intercept);
        log::info!("R-squared-value: {:.6}", line.r_value.powi(2));
        log::info!(
            "Slope: {:.6} ({:.10} degrees)",
            slope,
            slope.atan().to_degrees()
        );
        log::info!("Intercept: {:.6}", intercept);

        let norm = (slope * slope + 1f64).sqrt();
        let distance_map = Array2::from_shape_fn(crop.dim(), |(row, col)| {
            (slope * (col as f64 + 0.5) - (row as f64 + 0.5) + intercept) / norm
        });

        let mut samples: Vec<(f64, f64)> = distance_map
            .iter()
            .cloned()
            .zip(crop.iter().cloned())
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        // dark side first
        let n_tail = samples.len().min(10);
        let mean = |s: &[(f64, f64)]| s.iter().map(|(_, v)| v).sum::<f64>() / s.len() as f64;
        let sign = if mean(&samples[..n_tail]) > mean(&samples[samples.len() - n_tail..]) {
            -1f64
        } else {
            1f64
        };
        samples.iter_mut().for_each(|(d, _)| *d *= sign);
        if samples.first().map(|s| s.0) > samples.last().map(|s| s.0) {
            samples.reverse();
        }
        let (distances, values): (Vec<f64>, Vec<f64>) = samples.into_iter().unzip();

        let far_mean = |keep: &dyn Fn(f64) -> bool| -> Option<f64> {
            let far: Vec<f64> = distances
                .iter()
                .zip(&values)
                .filter(|(d, _)| keep(**d))
                .map(|(_, &v)| v)
                .collect();
            if far.is_empty() {
                None
            } else {
                Some(far.iter().sum::<f64>() / far.len() as f64)
            }
        };
        let flat_mean = far_mean(&|d| d > 10f64).ok_or(MtfError::FarField)?;
        log::info!("Mean count: {:.2}", flat_mean);
        let dark_mean = far_mean(&|d| d < -10f64).ok_or(MtfError::FarField)?;
        log::info!("Mean dark count: {:.2}", dark_mean);
        if flat_mean == dark_mean {
            return Err(MtfError::NoContrast(flat_mean));
        }
        let esf = values
            .iter()
            .map(|v| (v - dark_mean) / (flat_mean - dark_mean))
            .collect();

        Ok(Self {
            distances,
            values,
            esf,
            slope,
            intercept,
            r_squared: line.r_value.powi(2),
            flat_mean,
            dark_mean,
        })
    }
}
