//! Noise power spectrum
//!
//! The NPS is measured from a stack of flat fields: the mean frame is
//! subtracted from every frame, the power spectra of the differences are
//! averaged and azimuthally integrated (Paton et al. 2021, eq. 2).
//! The spectrum is normalized by its zero-frequency value NPS(0), estimated
//! from the variance of the frames binned by increasing factors
//! (McMullan et al. 2009).

use std::f64::consts::SQRT_2;

use indicatif::{ParallelProgressIterator, ProgressBar};
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::{
    curve::{Curve, CurveError, Metric},
    fit::{CurveFit, FitError, Model},
    fourier::{bin_mic_ft, ft, ift, mic_freqs, BinOptions, FourierError},
};

#[derive(Debug, thiserror::Error)]
pub enum NpsError {
    #[error("expected at least {expected} frames, found {found}")]
    Frames { expected: usize, found: usize },
    #[error("frames of shape {0:?} are too small to estimate NPS(0)")]
    TooSmall((usize, usize)),
    #[error("crop size {crop} is larger than the frames {shape:?}")]
    Crop { crop: usize, shape: (usize, usize) },
    #[error("failed to bin a frame")]
    Fourier(#[from] FourierError),
    #[error("could not fit NPS(0)")]
    Fit(#[from] FitError),
    #[error(transparent)]
    Curve(#[from] CurveError),
}
type Result<T> = std::result::Result<T, NpsError>;

/// Drops the first and last frames of a recorded stack and crops the frames
/// to `crop x crop` pixels from their first row and column (no crop if 0)
pub fn trim_stack(frames: ArrayView3<f64>, crop: usize) -> Result<Array3<f64>> {
    let (n_frame, rows, cols) = frames.dim();
    if n_frame < 3 {
        return Err(NpsError::Frames {
            expected: 3,
            found: n_frame,
        });
    }
    if crop > rows.min(cols) {
        return Err(NpsError::Crop {
            crop,
            shape: (rows, cols),
        });
    }
    let (rows, cols) = if crop > 0 { (crop, crop) } else { (rows, cols) };
    Ok(frames
        .slice(s![1..n_frame - 1, ..rows, ..cols])
        .to_owned())
}

/// Power spectrum `|F|²` of a frame with the zero frequency at the centre
pub fn power_spectrum(frame: ArrayView2<f64>) -> Array2<f64> {
    let (rows, cols) = frame.dim();
    let half = ft(frame);
    let n_half = half.ncols();
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        // fftshift: output index i holds frequency index i - rows/2
        let k = (i + rows - rows / 2) % rows;
        let l = (j + cols - cols / 2) % cols;
        if l < n_half {
            half[[k, l]].norm_sqr()
        } else {
            half[[(rows - k) % rows, cols - l]].norm_sqr()
        }
    })
}

/// Azimuthal average over integer radius bins around the centre pixel `(rows/2, cols/2)`
pub fn radial_profile(data: &Array2<f64>) -> Vec<f64> {
    let (rows, cols) = data.dim();
    let (c_row, c_col) = ((rows / 2) as f64, (cols / 2) as f64);
    let radius = |row: usize, col: usize| (row as f64 - c_row).hypot(col as f64 - c_col) as usize;
    let n_bin = radius(0, 0)
        .max(radius(rows - 1, cols - 1))
        .max(radius(0, cols - 1))
        .max(radius(rows - 1, 0))
        + 1;
    let mut sums = vec![0f64; n_bin];
    let mut counts = vec![0usize; n_bin];
    for ((row, col), v) in data.indexed_iter() {
        let r = radius(row, col);
        sums[r] += v;
        counts[r] += 1;
    }
    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| sum / count as f64)
        .collect()
}

/// Binning factors used to estimate NPS(0) on frames of `n` rows
///
/// Powers of two from 2, the last two powers below `n` are left out as the
/// binned frames would be too small.
pub fn nps0_factors(n: usize) -> Vec<usize> {
    if n < 2 {
        return vec![];
    }
    let max_exponent = (n as f64).log2().ceil() as u32;
    let mut factors: Vec<usize> = (1..max_exponent).map(|e| 1usize << e).collect();
    factors.truncate(factors.len().saturating_sub(2));
    factors
}

/// NPS(0) estimates `(factor, variance/factor²)` of every frame, minus `mean`,
/// Fourier binned by each of the [nps0_factors]
///
/// Frames are processed in parallel, the estimates are returned in frame order.
pub fn nps0(frames: ArrayView3<f64>, mean: ArrayView2<f64>) -> Result<Vec<(usize, f64)>> {
    let (n_frame, rows, cols) = frames.dim();
    let factors = nps0_factors(rows);
    if factors.is_empty() {
        return Err(NpsError::TooSmall((rows, cols)));
    }
    log::info!("Estimating NPS(0) with binning factors {:?}", factors);
    let freqs = mic_freqs((rows, cols), 1f64);
    let pb = ProgressBar::new(n_frame as u64);
    let estimates = (0..n_frame)
        .into_par_iter()
        .progress_with(pb)
        .map(|k| -> Result<Vec<(usize, f64)>> {
            let frame = &frames.index_axis(Axis(0), k) - &mean;
            let spectrum = ft(frame.view());
            factors
                .iter()
                .map(|&factor| -> Result<(usize, f64)> {
                    let cutoff = 1f64 / (2 * factor) as f64;
                    let binned = ift(
                        bin_mic_ft(&spectrum, &freqs, cutoff, BinOptions::default())?.view(),
                    )?;
                    let variance = binned.var(0f64);
                    Ok((factor, variance / (factor * factor) as f64))
                })
                .collect()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(estimates.into_iter().flatten().collect())
}

/// NPS(0) as a function of the binning factor, `a*x/(x+b)`
pub struct Nps0Model;
impl Model for Nps0Model {
    fn n_params(&self) -> usize {
        2
    }
    fn value(&self, x: f64, params: &[f64]) -> f64 {
        params[0] * x / (x + params[1])
    }
    fn gradient(&self, x: f64, params: &[f64]) -> Vec<f64> {
        let (a, b) = (params[0], params[1]);
        vec![x / (x + b), -a * x / (x + b).powi(2)]
    }
}

/// NPS measurement options
#[derive(Debug, Clone, Default)]
pub struct NpsOptions {
    super_res: Option<usize>,
    guess: bool,
}
impl NpsOptions {
    /// Super-resolution scaling of the frequency axis
    pub fn super_res(self, super_res: usize) -> Self {
        Self {
            super_res: Some(super_res),
            ..self
        }
    }
    /// Normalizes with the guessed NPS(0) instead of the fitted one
    pub fn guess(self, guess: bool) -> Self {
        Self { guess, ..self }
    }
}

/// Outcome of a flat field measurement
#[derive(Debug, Clone)]
pub struct NpsMeasurement {
    /// Mean of the frames
    pub mean: Array2<f64>,
    /// 2D NPS, zero frequency at the centre
    pub nps: Array2<f64>,
    /// Radial profile of the 2D NPS
    pub nps_1d: Vec<f64>,
    /// NPS(0) estimates `(factor, NPS(0))`
    pub nps0_estimates: Vec<(usize, f64)>,
    /// NPS(0) guessed from the low frequencies of the radial profile
    pub nps0_guess: f64,
    /// Fitted `[a, b]` of [Nps0Model], `a` is the fitted NPS(0)
    pub nps0_fit: [f64; 2],
    /// NPS(0) used for the normalization
    pub nps0: f64,
    /// Normalized 1D NPS
    pub curve: Curve,
}

/// Measures the normalized noise power spectrum of a stack of flat fields
pub fn measure(frames: ArrayView3<f64>, options: &NpsOptions) -> Result<NpsMeasurement> {
    let (n_frame, rows, cols) = frames.dim();
    if n_frame < 2 {
        return Err(NpsError::Frames {
            expected: 2,
            found: n_frame,
        });
    }
    let mean = frames
        .mean_axis(Axis(0))
        .ok_or(NpsError::Frames {
            expected: 2,
            found: 0,
        })?;

    log::info!("Computing the power spectra of {} frames", n_frame);
    let spectra: Vec<Array2<f64>> = (0..n_frame)
        .into_par_iter()
        .map(|k| power_spectrum((&frames.index_axis(Axis(0), k) - &mean).view()))
        .collect();
    let mut nps = Array2::<f64>::zeros((rows, cols));
    spectra.iter().for_each(|ps| nps += ps);
    nps /= (n_frame * rows * cols) as f64;
    let nps_1d = radial_profile(&nps);

    let nps0_estimates = nps0(frames, mean.view())?;

    // the zero frequency is skipped as it may hold a large peak
    let n_guess = (nps_1d.len() as f64 * 0.1) as usize;
    if n_guess < 2 {
        return Err(NpsError::TooSmall((rows, cols)));
    }
    let nps0_guess = nps_1d[1..n_guess].iter().sum::<f64>() / (n_guess - 1) as f64;
    log::info!("Guessed NPS(0): {:.2}", nps0_guess);

    let (x, y): (Vec<f64>, Vec<f64>) = nps0_estimates
        .iter()
        .map(|&(factor, nps0)| (factor as f64, nps0))
        .unzip();
    let lower = [0.5 * nps0_guess, 0f64];
    let upper = [1.5 * nps0_guess, f64::INFINITY];
    log::info!("NPS(0) fit bounds: {:?}, {:?}", lower, upper);
    let fit = CurveFit::new(&Nps0Model, &[nps0_guess, 1f64])
        .bounds(&lower, &upper)
        .max_evaluations(100_000)
        .fit(&x, &y)?;
    let nps0_fit = [fit.params[0], fit.params[1]];
    log::info!("Fitted NPS(0): {:.2}", nps0_fit[0]);

    let nps0 = if options.guess {
        nps0_guess
    } else {
        nps0_fit[0]
    };
    let nnps_1d: Vec<f64> = nps_1d.iter().map(|v| v / nps0).collect();

    let super_res = options.super_res.unwrap_or(1);
    if super_res > 1 {
        log::info!("Applying super res scaling to final curve");
    }
    let n = nnps_1d.len();
    let w = (0..n)
        .map(|i| {
            let w = if n > 1 {
                SQRT_2 * i as f64 / (n - 1) as f64
            } else {
                0f64
            };
            w * super_res as f64
        })
        .collect();
    let curve = Curve::new(Metric::Nps, w, nnps_1d)?;

    Ok(NpsMeasurement {
        mean,
        nps,
        nps_1d,
        nps0_estimates,
        nps0_guess,
        nps0_fit,
        nps0,
        curve,
    })
}
