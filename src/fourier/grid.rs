use ndarray::Array2;

/// Sample frequencies of a full length-`n` DFT with sample spacing `d`
///
/// The sequence is `[0, 1, ..., (n-1)/2, -(n/2), ..., -1] / (n*d)`.
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    if n == 0 {
        return vec![];
    }
    let scale = 1f64 / (n as f64 * d);
    (0..n)
        .map(|k| {
            if k <= (n - 1) / 2 {
                k as f64 * scale
            } else {
                (k as f64 - n as f64) * scale
            }
        })
        .collect()
}

/// Non-negative sample frequencies of a real length-`n` DFT with sample spacing `d`
pub fn rfftfreq(n: usize, d: f64) -> Vec<f64> {
    let scale = 1f64 / (n as f64 * d);
    (0..=n / 2).map(|k| k as f64 * scale).collect()
}

/// Spatial frequency magnitude of every coefficient of the half spectrum of an
/// `(n_x, n_y)` image with pixel size `apix`
pub fn mic_freqs(shape: (usize, usize), apix: f64) -> Array2<f64> {
    let (n_x, n_y) = shape;
    let f_x = rfftfreq(n_y, apix);
    let f_y = fftfreq(n_x, apix);
    Array2::from_shape_fn((n_x, f_x.len()), |(i, j)| f_x[j].hypot(f_y[i]))
}

/// Same as [mic_freqs] together with the angle `atan2(fy, fx)` of each coefficient
pub fn mic_freqs_with_angles(shape: (usize, usize), apix: f64) -> (Array2<f64>, Array2<f64>) {
    let (n_x, n_y) = shape;
    let f_x = rfftfreq(n_y, apix);
    let f_y = fftfreq(n_x, apix);
    let angles = Array2::from_shape_fn((n_x, f_x.len()), |(i, j)| f_y[i].atan2(f_x[j]));
    (mic_freqs(shape, apix), angles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fftfreq_even_odd() {
        assert_eq!(fftfreq(4, 1.), vec![0., 0.25, -0.5, -0.25]);
        assert_eq!(fftfreq(5, 1.), vec![0., 0.2, 0.4, -0.4, -0.2]);
    }

    #[test]
    fn rfftfreq_reaches_nyquist() {
        assert_eq!(rfftfreq(8, 1.), vec![0., 0.125, 0.25, 0.375, 0.5]);
        assert_eq!(rfftfreq(7, 1.).len(), 4);
    }

    #[test]
    fn grid_layout() {
        let freqs = mic_freqs((8, 6), 1.);
        assert_eq!(freqs.dim(), (8, 4));
        // first row is the horizontal axis, first column the folded vertical axis
        assert_abs_diff_eq!(freqs[[0, 3]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(freqs[[4, 0]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(freqs[[7, 0]], 0.125, epsilon = 1e-12);
        assert_abs_diff_eq!(
            freqs[[1, 1]],
            (0.125f64.powi(2) + (1. / 6f64).powi(2)).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn pixel_size_scales_frequencies() {
        let freqs = mic_freqs((16, 16), 0.5);
        assert_abs_diff_eq!(freqs[[0, 8]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn angles() {
        let (_, angles) = mic_freqs_with_angles((8, 8), 1.);
        assert_abs_diff_eq!(angles[[0, 2]], 0., epsilon = 1e-12);
        assert_abs_diff_eq!(angles[[2, 0]], std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(angles[[6, 0]], -std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }
}
