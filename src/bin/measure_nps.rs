use std::path::PathBuf;

use anyhow::Context;
use env_logger::Env;
use mtf_nps_dqe::{
    curve::file_name,
    io,
    nps::{self, NpsOptions},
    simulate, SimulationConfig,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "measure_nps",
    about = "Measures the NPS of a detector from a stack of flat fields"
)]
struct Opt {
    /// Input stack of flat fields (MRC), a stack is simulated if none is given
    #[structopt(parse(from_os_str))]
    file: Option<PathBuf>,
    /// Rescales the frequencies of the measured NPS curve by this factor
    #[structopt(long, default_value = "1")]
    super_res: usize,
    /// Stores the measured NPS curve
    #[structopt(long, parse(from_os_str))]
    store: Option<PathBuf>,
    /// Saves a plot of the normalized NPS
    #[structopt(long, parse(from_os_str))]
    output: Option<PathBuf>,
    /// Saves a plot of the NPS(0) estimates with their fit
    #[structopt(long, parse(from_os_str))]
    fit_output: Option<PathBuf>,
    /// Crops the frames to this (power of 2) size, helps with the NPS(0) estimates
    #[structopt(long, default_value = "0")]
    crop: usize,
    /// Uses the guessed NPS(0) instead of the fitted one
    #[structopt(long)]
    guess: bool,
    /// Gaussian sigma used for blurring the simulated frames
    #[structopt(long, default_value = "0")]
    gauss: f64,
    /// Applies a Hann filter (after Fourier binning)
    #[structopt(long)]
    hann: bool,
    /// Applies a Butterworth low-pass filter (during Fourier binning)
    #[structopt(long)]
    bw: bool,
    /// Simulated super resolution factor
    #[structopt(long, default_value = "1")]
    sim_super_res: usize,
    /// Initial upscale factor of the simulation
    #[structopt(long, default_value = "1")]
    factor: usize,
    /// Performs the simulation in real space
    #[structopt(long)]
    real: bool,
    /// Number of simulated frames
    #[structopt(long, default_value = "100")]
    frames: usize,
    /// Random generator seed of the simulation
    #[structopt(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let opt = Opt::from_args();

    let (frames, name) = match &opt.file {
        Some(path) => {
            let stack = io::load_stack(path).with_context(|| format!("reading {:?}", path))?;
            (nps::trim_stack(stack.view(), opt.crop)?, file_name(path))
        }
        None => {
            log::info!("No image supplied, simulating flat fields");
            let config = SimulationConfig::default()
                .gauss(opt.gauss)
                .hann(opt.hann)
                .butterworth(opt.bw)
                .super_res(opt.sim_super_res)
                .factor(opt.factor)
                .real(opt.real)
                .frames(opt.frames)
                .seed(opt.seed);
            (simulate::flat_fields(&config)?, config.description())
        }
    };
    let (n_frame, rows, cols) = frames.dim();
    log::info!("{}: {} frames of {}x{} pixels", name, n_frame, rows, cols);

    let options = NpsOptions::default()
        .super_res(opt.super_res)
        .guess(opt.guess);
    let measurement = match nps::measure(frames.view(), &options) {
        Ok(measurement) => measurement,
        Err(e) => {
            log::error!("Could not measure the NPS: {}", e);
            return Err(e.into());
        }
    };

    if let Some(output) = &opt.output {
        plot(&measurement, &name, output)?;
    }
    if let Some(output) = &opt.fit_output {
        plot_fit(&measurement, output)?;
    }
    if let Some(store) = &opt.store {
        measurement.curve.save(store)?;
    }
    Ok(())
}

#[cfg(feature = "plot")]
fn plot(
    measurement: &nps::NpsMeasurement,
    name: &str,
    output: &std::path::Path,
) -> anyhow::Result<()> {
    use mtf_nps_dqe::plot::{Figure, LineKind, Series};
    Figure::new("Normalised noise power spectrum")
        .x_range(0f64..1f64)
        .y_range(0f64..1.1f64)
        .series(Series::from_curve(&measurement.curve, name, LineKind::Measured))
        .draw(output)?;
    Ok(())
}
#[cfg(not(feature = "plot"))]
fn plot(_: &nps::NpsMeasurement, _: &str, output: &std::path::Path) -> anyhow::Result<()> {
    log::warn!("built without the `plot` feature, {:?} not written", output);
    Ok(())
}

#[cfg(feature = "plot")]
fn plot_fit(measurement: &nps::NpsMeasurement, output: &std::path::Path) -> anyhow::Result<()> {
    mtf_nps_dqe::plot::nps0_fit(measurement).draw(output)?;
    Ok(())
}
#[cfg(not(feature = "plot"))]
fn plot_fit(_: &nps::NpsMeasurement, output: &std::path::Path) -> anyhow::Result<()> {
    log::warn!("built without the `plot` feature, {:?} not written", output);
    Ok(())
}
