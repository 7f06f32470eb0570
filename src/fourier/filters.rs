use ndarray::{Array1, Array2};

use super::{ft, FourierError, Result};

/// Butterworth low-pass response `1/(1+(f/cutoff)^(2*order))` on a frequency grid
pub fn butterworth(mic_freqs: &Array2<f64>, cutoff: f64, order: u32) -> Array2<f64> {
    let exponent = 2 * order as i32;
    mic_freqs.mapv(|f| 1f64 / (1f64 + (f / cutoff).powi(exponent)))
}

/// Magnitude of the half spectrum of a normalized 2D Gaussian of width `sigma`
///
/// The Gaussian is sampled on a `grid_len x grid_len` grid and centred at
/// `(grid_len/2 - 1, grid_len/2 - 1)`; the result multiplies a half spectrum of
/// the same grid to blur the image without a real-space convolution.
pub fn gaussian_filter(sigma: f64, grid_len: usize) -> Result<Array2<f64>> {
    if !(sigma > 0f64) {
        return Err(FourierError::InvalidSigma(sigma));
    }
    let center = (grid_len / 2) as f64 - 1f64;
    let two_sigma_sq = 2f64 * sigma * sigma;
    let norm = 1f64 / (std::f64::consts::PI * two_sigma_sq);
    let gaussian = Array2::from_shape_fn((grid_len, grid_len), |(y, x)| {
        let (dx, dy) = (x as f64 - center, y as f64 - center);
        norm * (-(dx * dx + dy * dy) / two_sigma_sq).exp()
    });
    Ok(ft(gaussian.view()).mapv(|c| c.norm()))
}

/// Symmetric Hann window of length `n`
pub fn hann_window(n: usize) -> Array1<f64> {
    if n == 1 {
        return Array1::ones(1);
    }
    let m = (n - 1) as f64;
    Array1::from_shape_fn(n, |i| {
        0.5 - 0.5 * (2f64 * std::f64::consts::PI * i as f64 / m).cos()
    })
}

/// 2D Hann apodization of a `grid_len x grid_len` half spectrum
///
/// The outer product of two Hann windows is shifted so that its peak sits on
/// the zero frequency, and only the non-negative horizontal frequencies are kept.
pub fn hann_filter(grid_len: usize) -> Array2<f64> {
    let window = hann_window(grid_len);
    let shift = grid_len / 2;
    Array2::from_shape_fn((grid_len, grid_len / 2 + 1), |(i, j)| {
        window[(i + shift) % grid_len] * window[(j + shift) % grid_len]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourier::mic_freqs;
    use approx::assert_abs_diff_eq;

    #[test]
    fn butterworth_half_power_at_cutoff() {
        let freqs = mic_freqs((64, 64), 1.);
        let response = butterworth(&freqs, 0.25, 5);
        assert_abs_diff_eq!(response[[0, 0]], 1.);
        assert_abs_diff_eq!(response[[0, 16]], 0.5, epsilon = 1e-12);
        assert!(response[[0, 32]] < 1e-2);
    }

    #[test]
    fn gaussian_filter_is_unity_at_dc() {
        let filter = gaussian_filter(2., 64).unwrap();
        assert_eq!(filter.dim(), (64, 33));
        assert_abs_diff_eq!(filter[[0, 0]], 1., epsilon = 1e-6);
        // a spatial gaussian of width sigma is a spectral gaussian of width 1/(2 pi sigma)
        let f = 4. / 64.;
        let expected = (-2. * (std::f64::consts::PI * 2. * f).powi(2)).exp();
        assert_abs_diff_eq!(filter[[0, 4]], expected, epsilon = 1e-6);
        assert!(filter.iter().all(|&v| v <= 1. + 1e-9));
    }

    #[test]
    fn gaussian_filter_rejects_zero_sigma() {
        assert!(matches!(
            gaussian_filter(0., 16),
            Err(FourierError::InvalidSigma(_))
        ));
    }

    #[test]
    fn hann_window_shape() {
        let window = hann_window(5);
        assert_abs_diff_eq!(window[0], 0.);
        assert_abs_diff_eq!(window[2], 1., epsilon = 1e-12);
        assert_abs_diff_eq!(window[4], 0., epsilon = 1e-12);
    }

    #[test]
    fn hann_filter_peaks_at_dc() {
        let filter = hann_filter(64);
        assert_eq!(filter.dim(), (64, 33));
        let max = filter.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_abs_diff_eq!(filter[[0, 0]], max, epsilon = 1e-12);
        assert!(filter[[0, 0]] > 0.99);
        assert!(filter[[32, 32]] < 1e-2);
    }
}
