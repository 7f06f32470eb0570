use std::path::PathBuf;

use anyhow::Context;
use env_logger::Env;
use mtf_nps_dqe::{io, mtf, simulate, spatial, CropRegion, SimulationConfig};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "measure_mtf",
    about = "Measures the MTF of a detector from the image of an edge"
)]
struct Opt {
    /// Input image (TIFF or MRC), an edge is simulated if none is given
    #[structopt(parse(from_os_str))]
    file: Option<PathBuf>,
    /// Starting x coordinate of the crop
    #[structopt(short)]
    x: Option<usize>,
    /// Starting y coordinate of the crop
    #[structopt(short)]
    y: Option<usize>,
    /// Width of the crop
    #[structopt(long)]
    width: Option<usize>,
    /// Height of the crop
    #[structopt(long)]
    height: Option<usize>,
    /// Stores the measured MTF curve
    #[structopt(long, parse(from_os_str))]
    store: Option<PathBuf>,
    /// Saves a plot of the measured MTF
    #[structopt(long, parse(from_os_str))]
    output: Option<PathBuf>,
    /// Saves a plot of the edge spread function with its fit
    #[structopt(long, parse(from_os_str))]
    fit_output: Option<PathBuf>,
    /// Rescales the frequencies of the measured MTF curve by this factor
    #[structopt(long, default_value = "1")]
    super_res: usize,
    /// Number of quarter turns of the image
    #[structopt(long, default_value = "0")]
    rotate: usize,
    /// Gaussian sigma used for blurring the simulated edge
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
    /// Adds noise to the illuminated area
    #[structopt(long)]
    noise: bool,
    /// Random generator seed of the simulation
    #[structopt(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let opt = Opt::from_args();

    let (image, name) = match &opt.file {
        Some(path) => {
            let image = io::load_frame(path).with_context(|| format!("reading {:?}", path))?;
            let image = if opt.rotate > 0 {
                spatial::rot90(image.view(), opt.rotate)
            } else {
                image
            };
            (image, mtf_nps_dqe::curve::file_name(path))
        }
        None => {
            log::info!("No image supplied, simulating ideal edge");
            let config = SimulationConfig::default()
                .gauss(opt.gauss)
                .hann(opt.hann)
                .butterworth(opt.bw)
                .super_res(opt.sim_super_res)
                .factor(opt.factor)
                .real(opt.real)
                .noise(opt.noise)
                .seed(opt.seed);
            (simulate::edge(&config)?, config.description())
        }
    };

    let region = CropRegion::from_options(opt.x, opt.y, opt.width, opt.height, image.dim());
    log::info!("{}: cropping {}", name, region);
    let measurement = match mtf::measure(image.view(), region, opt.super_res) {
        Ok(measurement) => measurement,
        Err(e) => {
            log::error!("Could not fit ESF: {}", e);
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
    measurement: &mtf::MtfMeasurement,
    name: &str,
    output: &std::path::Path,
) -> anyhow::Result<()> {
    use mtf_nps_dqe::plot::{Figure, LineKind, Series};
    let lambda = measurement.lambda;
    Figure::new("MTF")
        .x_range(0f64..1f64)
        .y_range(0f64..1f64)
        .series(Series::from_fn("MTF(λ=0)", 0f64..1f64, |w| mtf::mtf(w, 0f64)))
        .series(Series::from_curve(
            &measurement.curve,
            format!("{} (λ={:.2}±{:.2})", name, lambda, measurement.lambda_err),
            LineKind::Measured,
        ))
        .draw(output)?;
    Ok(())
}
#[cfg(not(feature = "plot"))]
fn plot(_: &mtf::MtfMeasurement, _: &str, output: &std::path::Path) -> anyhow::Result<()> {
    log::warn!("built without the `plot` feature, {:?} not written", output);
    Ok(())
}

#[cfg(feature = "plot")]
fn plot_fit(measurement: &mtf::MtfMeasurement, output: &std::path::Path) -> anyhow::Result<()> {
    mtf_nps_dqe::plot::esf_fit(measurement).draw(output)?;
    Ok(())
}
#[cfg(not(feature = "plot"))]
fn plot_fit(_: &mtf::MtfMeasurement, output: &std::path::Path) -> anyhow::Result<()> {
    log::warn!("built without the `plot` feature, {:?} not written", output);
    Ok(())
}
