//! Synthetic detector data
//!
//! An ideal edge or a stack of flat fields is generated on a grid `factor`
//! times finer than the detector, optionally blurred, and binned back to the
//! detector (times the super-resolution factor) either in real space or by
//! Fourier cropping.
//! The illumination is scaled by `1/factor²` so that the binned counts do not
//! depend on the upscale factor.

use ndarray::{Array2, Array3, Axis};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::{
    fourier::{
        apply_filter, bin_mic_ft, ft, ft_stack, gaussian_filter, hann_filter, ift, ift_stack,
        mic_freqs, BinOptions, FourierError,
    },
    spatial,
};

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("the upscale factor must be strictly positive")]
    Factor,
    #[error("the super-resolution factor {super_res} must be in [1, factor={factor}]")]
    SuperRes { super_res: usize, factor: usize },
    #[error("invalid noise distribution")]
    Noise(#[from] rand_distr::NormalError),
    #[error(transparent)]
    Fourier(#[from] FourierError),
}
type Result<T> = std::result::Result<T, SimulationError>;

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    shape: usize,
    factor: usize,
    super_res: usize,
    gauss: f64,
    hann: bool,
    butterworth: bool,
    real: bool,
    noise: bool,
    frames: usize,
    angle: f64,
    seed: Option<u64>,
}
impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            shape: 512,
            factor: 1,
            super_res: 1,
            gauss: 0f64,
            hann: false,
            butterworth: false,
            real: false,
            noise: false,
            frames: 100,
            angle: 7f64,
            seed: None,
        }
    }
}
impl SimulationConfig {
    /// Detector image size
    pub fn shape(self, shape: usize) -> Self {
        Self { shape, ..self }
    }
    /// Upscale factor of the simulation grid
    pub fn factor(self, factor: usize) -> Self {
        Self { factor, ..self }
    }
    /// Super-resolution factor of the binned output
    pub fn super_res(self, super_res: usize) -> Self {
        Self { super_res, ..self }
    }
    /// Gaussian blur sigma in detector pixels
    pub fn gauss(self, gauss: f64) -> Self {
        Self { gauss, ..self }
    }
    /// Hann apodization after Fourier binning
    pub fn hann(self, hann: bool) -> Self {
        Self { hann, ..self }
    }
    /// Butterworth low-pass during Fourier binning
    pub fn butterworth(self, butterworth: bool) -> Self {
        Self {
            butterworth,
            ..self
        }
    }
    /// Blur and bin in real space instead of Fourier space
    pub fn real(self, real: bool) -> Self {
        Self { real, ..self }
    }
    /// Gaussian noise on the illuminated side of the edge
    pub fn noise(self, noise: bool) -> Self {
        Self { noise, ..self }
    }
    /// Number of flat fields
    pub fn frames(self, frames: usize) -> Self {
        Self { frames, ..self }
    }
    /// Edge rotation in degrees
    pub fn angle(self, angle: f64) -> Self {
        Self { angle, ..self }
    }
    /// Random generator seed
    pub fn seed(self, seed: Option<u64>) -> Self {
        Self { seed, ..self }
    }

    /// Size of the binned simulation
    pub fn output_shape(&self) -> usize {
        self.shape * self.super_res
    }
    pub fn super_res_factor(&self) -> usize {
        self.super_res
    }
    /// Mean count and standard deviation of an illuminated pixel on the simulation grid
    pub fn illumination(&self) -> (f64, f64) {
        let scale = (self.factor * self.factor) as f64;
        (100f64 / scale, 10f64 / scale)
    }
    /// Human readable summary used as a default label
    pub fn description(&self) -> String {
        format!(
            "Simulated (real:{}, gauss:{}, hann:{}, bw:{}, sim_super_res:{}, factor:{}, noise:{})",
            self.real,
            self.gauss,
            self.hann,
            self.butterworth,
            self.super_res,
            self.factor,
            self.noise
        )
    }

    fn validate(&self) -> Result<()> {
        if self.factor == 0 {
            return Err(SimulationError::Factor);
        }
        if self.super_res == 0 || self.super_res > self.factor {
            return Err(SimulationError::SuperRes {
                super_res: self.super_res,
                factor: self.factor,
            });
        }
        Ok(())
    }
    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
    fn fourier_options(&self) -> BinOptions {
        BinOptions::default().lowpass(self.butterworth)
    }
    fn cutoff(&self) -> f64 {
        self.super_res as f64 / 2f64
    }
    fn grid_freqs(&self) -> Array2<f64> {
        let n = self.shape * self.factor;
        mic_freqs((n, n), 1f64 / self.factor as f64)
    }
}

/// Simulates a straight edge, dark on the left and illuminated on the right,
/// rotated by the configured angle
pub fn edge(config: &SimulationConfig) -> Result<Array2<f64>> {
    config.validate()?;
    let n = config.shape * config.factor;
    let (ill, ill_noise) = config.illumination();
    log::info!("Simulating a {n}x{n} edge ({})", config.description());

    let mut im = Array2::<f64>::zeros((n, n));
    if config.noise {
        let mut rng = config.rng();
        let normal = Normal::new(ill, ill_noise)?;
        im.slice_mut(ndarray::s![.., n / 2..])
            .iter_mut()
            .for_each(|v| *v = normal.sample(&mut rng));
    } else {
        im.slice_mut(ndarray::s![.., n / 2..]).fill(ill);
    }
    let im = spatial::rotate(im.view(), config.angle);

    if config.real {
        let mut im = im;
        if config.gauss > 0f64 {
            im = spatial::gaussian_blur(im.view(), config.gauss * config.factor as f64);
        }
        if config.factor > 1 {
            im = spatial::downscale_local_mean(im.view(), config.factor / config.super_res);
        }
        return Ok(im);
    }

    let mut spectrum = ft(im.view());
    if config.gauss > 0f64 {
        apply_filter(
            &mut spectrum,
            &gaussian_filter(config.gauss * config.factor as f64, n)?,
        )?;
    }
    if config.factor > 1 {
        spectrum = bin_mic_ft(
            &spectrum,
            &config.grid_freqs(),
            config.cutoff(),
            config.fourier_options(),
        )?;
    }
    if config.hann {
        apply_filter(&mut spectrum, &hann_filter(config.output_shape()))?;
    }
    Ok(ift(spectrum.view())?)
}

/// Simulates a stack of uniformly illuminated frames with 8 bits Gaussian counts
pub fn flat_fields(config: &SimulationConfig) -> Result<Array3<f64>> {
    config.validate()?;
    let n = config.shape * config.factor;
    let (ill, ill_noise) = config.illumination();
    log::info!(
        "Simulating {} {n}x{n} flat fields ({})",
        config.frames,
        config.description()
    );

    let mut rng = config.rng();
    let normal = Normal::new(ill, ill_noise)?;
    let frames = Array3::from_shape_simple_fn((config.frames, n, n), || {
        normal.sample(&mut rng) as u8 as f64
    });

    if config.real {
        let blurred: Vec<Array2<f64>> = frames
            .outer_iter()
            .map(|frame| {
                let mut frame = frame.to_owned();
                if config.gauss > 0f64 {
                    frame = spatial::gaussian_blur(frame.view(), config.gauss * config.factor as f64);
                }
                if config.factor > 1 {
                    frame =
                        spatial::downscale_local_mean(frame.view(), config.factor / config.super_res);
                }
                frame
            })
            .collect();
        let views: Vec<_> = blurred.iter().map(|frame| frame.view()).collect();
        return Ok(ndarray::stack(Axis(0), &views).map_err(FourierError::from)?);
    }

    let mut spectra = ft_stack(frames.view());
    if config.gauss > 0f64 {
        apply_filter(
            &mut spectra,
            &gaussian_filter(config.gauss * config.factor as f64, n)?,
        )?;
    }
    if config.factor > 1 {
        spectra = bin_mic_ft(
            &spectra,
            &config.grid_freqs(),
            config.cutoff(),
            config.fourier_options(),
        )?;
    }
    if config.hann {
        apply_filter(&mut spectra, &hann_filter(config.output_shape()))?;
    }
    Ok(ift_stack(spectra.view())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn builder() {
        let config = SimulationConfig::default().factor(4).super_res(2).gauss(0.5);
        assert_eq!(config.output_shape(), 1024);
        assert_eq!(config.illumination(), (100. / 16., 10. / 16.));
        assert!(config.description().contains("factor:4"));
    }

    #[test]
    fn invalid_super_res() {
        let config = SimulationConfig::default().shape(16).factor(2).super_res(4);
        assert!(matches!(
            edge(&config),
            Err(SimulationError::SuperRes { .. })
        ));
        assert!(matches!(
            edge(&config.factor(0)),
            Err(SimulationError::Factor)
        ));
    }

    #[test]
    fn edge_sides() {
        let config = SimulationConfig::default().shape(64);
        let im = edge(&config).unwrap();
        assert_eq!(im.dim(), (64, 64));
        assert_abs_diff_eq!(im[[32, 4]], 0., epsilon = 1e-9);
        assert_abs_diff_eq!(im[[32, 59]], 100., epsilon = 1e-9);
    }

    #[test]
    fn binned_edge_keeps_its_counts() {
        for real in [false, true] {
            let config = SimulationConfig::default().shape(64).factor(2).real(real);
            let im = edge(&config).unwrap();
            assert_eq!(im.dim(), (64, 64));
            // Fourier cropping sums the fine pixels, block averaging does not
            let expected = if real { 25. } else { 100. };
            assert_abs_diff_eq!(im[[32, 48]], expected, epsilon = 5.);
            assert_abs_diff_eq!(im[[32, 16]], 0., epsilon = 5.);
        }
    }

    #[test]
    fn seeded_flat_fields_are_reproducible() {
        let config = SimulationConfig::default().shape(16).frames(3).seed(Some(7));
        let a = flat_fields(&config).unwrap();
        let b = flat_fields(&config).unwrap();
        assert_eq!(a.dim(), (3, 16, 16));
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.fract().abs() < 1e-6 || (1. - v.fract()).abs() < 1e-6));
    }

    #[test]
    fn fourier_binned_flat_fields() {
        let config = SimulationConfig::default()
            .shape(16)
            .factor(2)
            .frames(2)
            .hann(true)
            .butterworth(true)
            .seed(Some(1));
        assert_eq!(flat_fields(&config).unwrap().dim(), (2, 16, 16));
    }
}
