//! Fourier cropping
//!
//! Binning an image by discarding the spectral content above a cutoff
//! frequency: an ideal low-pass filter followed by decimation, done directly
//! on the half spectrum.

use ndarray::{
    concatenate, Array, Array2, ArrayBase, ArrayView2, Axis, Data, Dimension, RemoveAxis, Slice,
};
use rustfft::num_complex::Complex64;

use super::{apply_filter, butterworth, ft, ift, mic_freqs, FourierError, Result};

/// Options of [bin_mic_ft]
#[derive(Debug, Clone, Copy)]
pub struct BinOptions {
    /// Apply a Butterworth low-pass filter at the cutoff before cropping
    pub lowpass: bool,
    /// Butterworth filter order
    pub order: u32,
}
impl Default for BinOptions {
    fn default() -> Self {
        Self {
            lowpass: false,
            order: 5,
        }
    }
}
impl BinOptions {
    pub fn lowpass(self, lowpass: bool) -> Self {
        Self { lowpass, ..self }
    }
    pub fn order(self, order: u32) -> Self {
        Self { order, ..self }
    }
}

/// Crop boundary indices `(c_h, c_v)` of a frequency grid for the given cutoff
///
/// `c_h` is the index of the first horizontal frequency reaching the cutoff and
/// `c_v` the same index over the non-negative part of the vertical axis.
pub fn crop_indices(mic_freqs: &Array2<f64>, cutoff: f64) -> (usize, usize) {
    let f_h: Vec<f64> = mic_freqs.row(0).to_vec();
    let n_v = (mic_freqs.nrows() + 1) / 2;
    let f_v: Vec<f64> = mic_freqs.column(0).iter().take(n_v).cloned().collect();
    let c_h = f_h.partition_point(|&f| f < cutoff);
    let c_v = f_v.partition_point(|&f| f < cutoff);
    (c_h, c_v)
}

/// Crops a half spectrum (single image or stack of frames) to the given cutoff
///
/// The last two axes of `mic_ft` are the spectrum rows and columns, a leading
/// third axis indexes frames and is left untouched. `mic_freqs` is the
/// frequency grid of one frame, the cutoff is expressed in the grid units.
/// The cropped spectrum has `2*c_v` rows and `c_h+1` columns, see [crop_indices].
pub fn bin_mic_ft<S, D>(
    mic_ft: &ArrayBase<S, D>,
    mic_freqs: &Array2<f64>,
    cutoff: f64,
    options: BinOptions,
) -> Result<Array<Complex64, D>>
where
    S: Data<Elem = Complex64>,
    D: Dimension + RemoveAxis,
{
    let ndim = mic_ft.ndim();
    if !(2..=3).contains(&ndim) {
        return Err(FourierError::InvalidRank(ndim));
    }
    let (row_axis, col_axis) = (Axis(ndim - 2), Axis(ndim - 1));
    let (rows, cols) = (mic_ft.len_of(row_axis), mic_ft.len_of(col_axis));
    if mic_freqs.dim() != (rows, cols) {
        return Err(FourierError::GridShape {
            expected: (rows, cols),
            found: mic_freqs.dim(),
        });
    }

    let mut spectrum = mic_ft.to_owned();
    if options.lowpass {
        apply_filter(&mut spectrum, &butterworth(mic_freqs, cutoff, options.order))?;
    }

    let (c_h, c_v) = crop_indices(mic_freqs, cutoff);
    let n_cols = (c_h + 1).min(cols);
    let n_bottom = c_v.min(rows - c_v);
    log::debug!(
        "fourier crop at {cutoff}: ({rows}, {cols}) -> ({}, {n_cols})",
        c_v + n_bottom
    );

    let kept = spectrum.slice_axis(col_axis, Slice::from(..n_cols));
    let top = kept.slice_axis(row_axis, Slice::from(..c_v));
    let bottom = kept.slice_axis(row_axis, Slice::from(rows - n_bottom..));
    Ok(concatenate(row_axis, &[top, bottom])?)
}

/// Bins an image by `factor` with a hard Fourier crop at `0.5/factor` cycles/pixel
pub fn fourier_bin(mic: ArrayView2<f64>, factor: usize) -> Result<Array2<f64>> {
    if factor == 0 {
        return Err(FourierError::InvalidFactor);
    }
    let mic_freqs = mic_freqs(mic.dim(), 1f64);
    let mic_ft = ft(mic);
    let binned = bin_mic_ft(
        &mic_ft,
        &mic_freqs,
        0.5 / factor as f64,
        BinOptions::default(),
    )?;
    ift(binned.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::fourier::ft_stack;
    use ndarray::{Array4, IxDyn};

    fn image(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, n), |(i, j)| {
            (i as f64 * 0.37).sin() * (j as f64 * 0.21).cos() + ((i + 2 * j) % 5) as f64
        })
    }

    #[test]
    fn cropped_shape() {
        let mic = image(64);
        let spectrum = ft(mic.view());
        let freqs = mic_freqs(mic.dim(), 1.);
        let binned = bin_mic_ft(&spectrum, &freqs, 0.25, BinOptions::default()).unwrap();
        assert_eq!(binned.dim(), (32, 17));
        let binned = bin_mic_ft(&spectrum, &freqs, 0.125, BinOptions::default()).unwrap();
        assert_eq!(binned.dim(), (16, 9));
    }

    #[test]
    fn crop_keeps_both_ends_of_the_vertical_axis() {
        let freqs = mic_freqs((8, 8), 1.);
        let spectrum = Array2::from_shape_fn((8, 5), |(i, j)| Complex64::new(i as f64, j as f64));
        let binned = bin_mic_ft(&spectrum, &freqs, 0.25, BinOptions::default()).unwrap();
        let rows: Vec<f64> = binned.column(0).iter().map(|c| c.re).collect();
        assert_eq!(rows, vec![0., 1., 6., 7.]);
        let cols: Vec<f64> = binned.row(0).iter().map(|c| c.im).collect();
        assert_eq!(cols, vec![0., 1., 2.]);
    }

    #[test]
    fn no_crop_at_nyquist() {
        let mic = image(32);
        let spectrum = ft(mic.view());
        let freqs = mic_freqs(mic.dim(), 1.);
        for cutoff in [0.5, 0.7] {
            let binned = bin_mic_ft(&spectrum, &freqs, cutoff, BinOptions::default()).unwrap();
            assert_eq!(binned.dim(), spectrum.dim());
            assert!(binned.iter().zip(spectrum.iter()).all(|(a, b)| a == b));
        }
    }

    #[test]
    fn lowpass_is_transparent_far_below_cutoff() {
        let mic = image(32);
        let spectrum = ft(mic.view());
        let freqs = mic_freqs(mic.dim(), 1.);
        let binned =
            bin_mic_ft(&spectrum, &freqs, 5., BinOptions::default().lowpass(true)).unwrap();
        assert_eq!(binned.dim(), spectrum.dim());
        binned.iter().zip(spectrum.iter()).for_each(|(a, b)| {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-6 * (1. + b.norm()));
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-6 * (1. + b.norm()));
        });
    }

    #[test]
    fn crop_indices_decrease_with_binning() {
        let freqs = mic_freqs((512, 512), 1.);
        let indices: Vec<_> = [1usize, 2, 4, 8, 16]
            .iter()
            .map(|factor| crop_indices(&freqs, 0.5 / *factor as f64))
            .collect();
        indices.windows(2).for_each(|w| {
            assert!(w[1].0 < w[0].0);
            assert!(w[1].1 < w[0].1);
        });
        assert_eq!(indices[1], (128, 128));
    }

    #[test]
    fn stack_equals_frames() {
        let frames: Vec<Array2<f64>> = (0..3).map(|k| image(32) * (k as f64 + 1.)).collect();
        let views: Vec<_> = frames.iter().map(|frame| frame.view()).collect();
        let spectra = ft_stack(ndarray::stack(Axis(0), &views).unwrap().view());
        let freqs = mic_freqs((32, 32), 1.);
        let options = BinOptions::default().lowpass(true);
        let binned = bin_mic_ft(&spectra, &freqs, 0.125, options).unwrap();
        assert_eq!(binned.dim(), (3, 8, 5));
        for (k, frame) in frames.iter().enumerate() {
            let single = bin_mic_ft(&ft(frame.view()), &freqs, 0.125, options).unwrap();
            assert!(binned
                .index_axis(Axis(0), k)
                .iter()
                .zip(single.iter())
                .all(|(a, b)| a == b));
        }
    }

    #[test]
    fn invalid_rank() {
        let freqs = mic_freqs((4, 4), 1.);
        let spectrum = Array4::<Complex64>::zeros((1, 1, 4, 3));
        assert!(matches!(
            bin_mic_ft(&spectrum, &freqs, 0.25, BinOptions::default()),
            Err(FourierError::InvalidRank(4))
        ));
        let spectrum = Array::<Complex64, _>::zeros(IxDyn(&[3]));
        assert!(matches!(
            bin_mic_ft(&spectrum, &freqs, 0.25, BinOptions::default()),
            Err(FourierError::InvalidRank(1))
        ));
    }

    #[test]
    fn grid_mismatch() {
        let freqs = mic_freqs((8, 8), 1.);
        let spectrum = Array2::<Complex64>::zeros((4, 3));
        assert!(matches!(
            bin_mic_ft(&spectrum, &freqs, 0.25, BinOptions::default()),
            Err(FourierError::GridShape { .. })
        ));
    }

    #[test]
    fn binning_preserves_the_mean_times_factor_squared() {
        let mic = Array2::from_elem((64, 64), 3f64);
        let binned = fourier_bin(mic.view(), 4).unwrap();
        assert_eq!(binned.dim(), (16, 16));
        binned
            .iter()
            .for_each(|&v| assert_abs_diff_eq!(v, 3. * 16., epsilon = 1e-9));
    }
}
