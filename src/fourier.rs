//! Spectral-domain filter toolkit
//!
//! Real 2D Fourier transforms of micrographs and the operations performed on
//! their half spectrum: frequency grids, Fourier cropping (binning) and the
//! Gaussian, Hann and Butterworth multipliers.
//!
//! The half spectrum of a `rows x width` image has `rows` rows (the full,
//! wrapped, vertical frequency axis) and `width/2 + 1` columns (the
//! non-negative horizontal frequencies).
//! Every transform is computed on the calling thread so that repeated runs
//! give bit-identical results.

use ndarray::{Array, Array2, Array3, ArrayView2, ArrayView3, Axis, Dimension};
use rustfft::{num_complex::Complex64, FftPlanner};

mod crop;
mod filters;
mod grid;
pub use crop::{bin_mic_ft, crop_indices, fourier_bin, BinOptions};
pub use filters::{butterworth, gaussian_filter, hann_filter, hann_window};
pub use grid::{fftfreq, mic_freqs, mic_freqs_with_angles, rfftfreq};

#[derive(Debug, thiserror::Error)]
pub enum FourierError {
    #[error("expected a 2D image or a 3D stack of spectra, found {0} dimensions")]
    InvalidRank(usize),
    #[error("frequency grid shape {found:?} does not match the spectrum shape {expected:?}")]
    GridShape {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("an image of width {width} does not have a half spectrum of {columns} columns")]
    Width { width: usize, columns: usize },
    #[error("empty spectrum")]
    Empty,
    #[error("gaussian sigma must be strictly positive, found {0}")]
    InvalidSigma(f64),
    #[error("binning factor must be strictly positive")]
    InvalidFactor,
    #[error("failed to reassemble the cropped spectrum")]
    Shape(#[from] ndarray::ShapeError),
}
type Result<T> = std::result::Result<T, FourierError>;

/// Forward real 2D Fourier transform, returns the half spectrum
pub fn ft(mic: ArrayView2<f64>) -> Array2<Complex64> {
    let (n_x, n_y) = mic.dim();
    let mut planner = FftPlanner::<f64>::new();
    let row_fft = planner.plan_fft_forward(n_y);
    let col_fft = planner.plan_fft_forward(n_x);

    let mut spectrum = Array2::<Complex64>::zeros((n_x, n_y / 2 + 1));
    let mut buffer = vec![Complex64::default(); n_y];
    for (row, mut half) in mic.outer_iter().zip(spectrum.outer_iter_mut()) {
        buffer
            .iter_mut()
            .zip(row.iter())
            .for_each(|(b, &v)| *b = Complex64::new(v, 0f64));
        row_fft.process(&mut buffer);
        half.iter_mut().zip(&buffer).for_each(|(h, b)| *h = *b);
    }

    let mut buffer = vec![Complex64::default(); n_x];
    for mut column in spectrum.columns_mut() {
        buffer.iter_mut().zip(column.iter()).for_each(|(b, c)| *b = *c);
        col_fft.process(&mut buffer);
        column.iter_mut().zip(&buffer).for_each(|(c, b)| *c = *b);
    }
    spectrum
}

/// Inverse real 2D Fourier transform of a half spectrum, the image width is `2*(columns-1)`
pub fn ift(mic_ft: ArrayView2<Complex64>) -> Result<Array2<f64>> {
    let columns = mic_ft.ncols();
    if columns == 0 {
        return Err(FourierError::Empty);
    }
    ift_with_width(mic_ft, 2 * (columns - 1))
}

/// Inverse real 2D Fourier transform of a half spectrum into an image of the given width
pub fn ift_with_width(mic_ft: ArrayView2<Complex64>, width: usize) -> Result<Array2<f64>> {
    let (n_x, columns) = mic_ft.dim();
    if width / 2 + 1 != columns {
        return Err(FourierError::Width { width, columns });
    }
    if n_x == 0 || width == 0 {
        return Err(FourierError::Empty);
    }
    let mut planner = FftPlanner::<f64>::new();
    let col_ifft = planner.plan_fft_inverse(n_x);
    let row_ifft = planner.plan_fft_inverse(width);

    let mut half = mic_ft.to_owned();
    let mut buffer = vec![Complex64::default(); n_x];
    for mut column in half.columns_mut() {
        buffer.iter_mut().zip(column.iter()).for_each(|(b, c)| *b = *c);
        col_ifft.process(&mut buffer);
        column.iter_mut().zip(&buffer).for_each(|(c, b)| *c = *b);
    }

    let scale = 1f64 / (n_x * width) as f64;
    let mut mic = Array2::<f64>::zeros((n_x, width));
    let mut buffer = vec![Complex64::default(); width];
    for (row, mut out) in half.outer_iter().zip(mic.outer_iter_mut()) {
        // rebuild the negative horizontal frequencies from Hermitian symmetry
        for k in 0..width {
            buffer[k] = if k < columns {
                row[k]
            } else {
                row[width - k].conj()
            };
        }
        row_ifft.process(&mut buffer);
        out.iter_mut()
            .zip(&buffer)
            .for_each(|(o, b)| *o = b.re * scale);
    }
    Ok(mic)
}

/// Multiplies a half spectrum, or every frame of a stack of half spectra, by a real filter
pub fn apply_filter<D>(mic_ft: &mut Array<Complex64, D>, filter: &Array2<f64>) -> Result<()>
where
    D: Dimension,
{
    let ndim = mic_ft.ndim();
    if !(2..=3).contains(&ndim) {
        return Err(FourierError::InvalidRank(ndim));
    }
    let shape = mic_ft.shape();
    let expected = (shape[ndim - 2], shape[ndim - 1]);
    if filter.dim() != expected {
        return Err(FourierError::GridShape {
            expected,
            found: filter.dim(),
        });
    }
    mic_ft.zip_mut_with(filter, |s, &f| *s *= f);
    Ok(())
}

/// Forward transform of every frame of a stack
pub fn ft_stack(frames: ArrayView3<f64>) -> Array3<Complex64> {
    let (n_frame, n_x, n_y) = frames.dim();
    let mut spectra = Array3::<Complex64>::zeros((n_frame, n_x, n_y / 2 + 1));
    for (frame, mut spectrum) in frames.outer_iter().zip(spectra.outer_iter_mut()) {
        spectrum.assign(&ft(frame));
    }
    spectra
}

/// Inverse transform of every frame of a stack of half spectra
pub fn ift_stack(spectra: ArrayView3<Complex64>) -> Result<Array3<f64>> {
    let images = spectra
        .outer_iter()
        .map(|spectrum| ift(spectrum))
        .collect::<Result<Vec<_>>>()?;
    let views: Vec<_> = images.iter().map(|image| image.view()).collect();
    if views.is_empty() {
        return Err(FourierError::Empty);
    }
    Ok(ndarray::stack(Axis(0), &views)?)
}
