//! Modulation transfer function
//!
//! The MTF is measured from the image of a straight, slightly tilted, edge
//! (McMullan et al. 2009, Ultramicroscopy 109).
//! The edge spread function of the edge is fitted with the response of a
//! Gaussian point spread function of width `λ` and the MTF is derived
//! analytically from the fitted `λ`.

use std::f64::consts::PI;

use ndarray::ArrayView2;

use crate::{
    curve::{Curve, CurveError, Metric},
    fit::{CurveFit, FitError, Model},
};

mod edge;
pub use edge::{CropRegion, EdgeProfile};

#[derive(Debug, thiserror::Error)]
pub enum MtfError {
    #[error("crop region {region} does not fit in an image of shape {shape:?}")]
    Crop {
        region: CropRegion,
        shape: (usize, usize),
    },
    #[error("no edge found in the crop region")]
    NoEdge,
    #[error("the crop region does not extend 10 pixels on both sides of the edge")]
    FarField,
    #[error("bright and dark sides have the same mean count ({0})")]
    NoContrast(f64),
    #[error("could not fit the edge spread function")]
    Fit(#[from] FitError),
    #[error(transparent)]
    Curve(#[from] CurveError),
}
type Result<T> = std::result::Result<T, MtfError>;

/// Edge spread function (McMullan et al. 2009 Eq 12)
pub fn esf(x: f64, lambda: f64, x0: f64) -> f64 {
    0.5 * libm::erfc(-(x - x0) / lambda)
}
/// Line spread function (McMullan et al. 2009 Eq 11)
pub fn lsf(x: f64, lambda: f64, x0: f64) -> f64 {
    (-(x - x0).powi(2) / lambda.powi(2)).exp() / (PI * lambda)
}
/// MTF of the Gaussian point spread function (McMullan et al. 2009 Eq 13)
pub fn mtf_g(w: f64, lambda: f64) -> f64 {
    (-PI.powi(2) * lambda.powi(2) * w.powi(2) / 4f64).exp()
}
/// MTF of a perfect detector with square pixels, `sinc(πw/2)`
pub fn theoretical_mtf(w: f64) -> f64 {
    let x = PI * w / 2f64;
    if x == 0f64 {
        1f64
    } else {
        x.sin() / x
    }
}
/// Detector MTF (McMullan et al. 2009 Eq 14)
pub fn mtf(w: f64, lambda: f64) -> f64 {
    theoretical_mtf(w) * mtf_g(w, lambda)
}

/// [esf] as a model of the parameters `[λ, x0]`
pub struct EsfModel;
impl Model for EsfModel {
    fn n_params(&self) -> usize {
        2
    }
    fn value(&self, x: f64, params: &[f64]) -> f64 {
        esf(x, params[0], params[1])
    }
    fn gradient(&self, x: f64, params: &[f64]) -> Vec<f64> {
        let (lambda, x0) = (params[0], params[1]);
        let u = (x - x0) / lambda;
        let g = (-u * u).exp() / (PI.sqrt() * lambda);
        vec![-g * u, -g]
    }
}

/// Frequencies of the stored MTF curve, up to and including Nyquist
pub fn frequencies() -> Vec<f64> {
    (0..110).map(|i| i as f64 * 0.01).collect()
}

/// Outcome of an edge measurement
#[derive(Debug, Clone)]
pub struct MtfMeasurement {
    pub profile: EdgeProfile,
    pub region: CropRegion,
    /// Width of the Gaussian point spread function
    pub lambda: f64,
    pub lambda_err: f64,
    /// Edge position
    pub x0: f64,
    pub x0_err: f64,
    /// The Gaussian MTF at the frequencies of [frequencies], scaled by the super-resolution factor
    ///
    /// The fitted `λ` of a pixelated edge already carries the pixel aperture,
    /// so [mtf_g] alone is the detector MTF.
    pub curve: Curve,
}
impl MtfMeasurement {
    /// Gaussian MTF at `w` (fraction of Nyquist)
    pub fn mtf_g(&self, w: f64) -> f64 {
        mtf_g(w, self.lambda)
    }
    /// Logs the Gaussian MTF at a quarter, half and full Nyquist
    pub fn summary(&self) {
        log::info!("Lambda (fit): {:.5}±{:.2}", self.lambda, self.lambda_err);
        log::info!("x0 (fit): {:.2}±{:.2}", self.x0, self.x0_err);
        log::info!("MTF(0.25 Nyquist): {:.3}", self.mtf_g(0.25));
        log::info!("MTF(0.5 Nyquist): {:.3}", self.mtf_g(0.5));
        log::info!("MTF(1 Nyquist):   {:.3}", self.mtf_g(1.0));
    }
}

/// Measures the MTF from the edge inside `region`
pub fn measure(
    image: ArrayView2<f64>,
    region: CropRegion,
    super_res: usize,
) -> Result<MtfMeasurement> {
    let profile = EdgeProfile::extract(image, region)?;
    let fit = CurveFit::new(&EsfModel, &[1f64, 1f64])
        .max_evaluations(10_000)
        .fit(&profile.distances, &profile.esf)?;
    let (lambda, x0) = (fit.params[0], fit.params[1]);

    let w = frequencies();
    let values = w.iter().map(|&w| mtf_g(w, lambda)).collect();
    if super_res > 1 {
        log::info!("Applying super res scaling to final curve");
    }
    let w = w.into_iter().map(|w| w * super_res as f64).collect();
    let curve = Curve::new(Metric::Mtf, w, values)?;

    let measurement = MtfMeasurement {
        profile,
        region,
        lambda,
        lambda_err: fit.errors[0],
        x0,
        x0_err: fit.errors[1],
        curve,
    };
    measurement.summary();
    Ok(measurement)
}
