use std::path::PathBuf;

use env_logger::Env;
use mtf_nps_dqe::{
    dqe::{self, DQE0},
    Curve, Metric,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "calculate_dqe",
    about = "Calculates the DQE from measured MTF and NPS curves"
)]
struct Opt {
    /// Measured MTF curve (.npz)
    #[structopt(long, parse(from_os_str))]
    mtf: PathBuf,
    /// Measured NPS curve (.npz)
    #[structopt(long, parse(from_os_str))]
    nps: PathBuf,
    /// Assumed DQE(0)
    #[structopt(long, default_value = "0.95")]
    dqe0: f64,
    /// Stores the DQE curve
    #[structopt(long, parse(from_os_str))]
    store: Option<PathBuf>,
    /// Label stored with the DQE curve (default: file name of the store)
    #[structopt(long)]
    name: Option<String>,
    /// Saves a plot of the DQE
    #[structopt(long, parse(from_os_str))]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let opt = Opt::from_args();
    if opt.dqe0 != DQE0 {
        log::info!("DQE(0): {}", opt.dqe0);
    }

    let label = dqe::label(opt.name.as_deref(), opt.store.as_ref(), &opt.mtf, &opt.nps);
    let mtf = Curve::load(&opt.mtf, Metric::Mtf)?;
    let nps = Curve::load(&opt.nps, Metric::Nps)?;
    let dqe = dqe::calculate(&mtf, &nps, opt.dqe0)?.with_label(label);

    if let Some(output) = &opt.output {
        plot(&mtf, &nps, &dqe, output)?;
    }
    if let Some(store) = &opt.store {
        dqe.save(store)?;
    }
    Ok(())
}

#[cfg(feature = "plot")]
fn plot(mtf: &Curve, nps: &Curve, dqe: &Curve, output: &std::path::Path) -> anyhow::Result<()> {
    use mtf_nps_dqe::plot::{Figure, LineKind, Series};
    let mtf_at_nps: Vec<(f64, f64)> = nps.w.iter().map(|&w| (w, mtf.at(w))).collect();
    let mtf_squared = mtf_at_nps.iter().map(|&(w, v)| (w, v * v)).collect();
    Figure::new(dqe.label.clone().unwrap_or_else(|| "DQE".to_string()))
        .x_range(0f64..1f64)
        .y_range(0f64..1.1f64)
        .series(Series::from_curve(nps, "NPS", LineKind::Measured))
        .series(Series::new("MTF", mtf_at_nps, LineKind::Measured))
        .series(Series::from_curve(dqe, "DQE", LineKind::Measured))
        .series(Series::new("MTF^2", mtf_squared, LineKind::Measured))
        .series(Series::from_fn("Theoretical DQE", 0f64..1f64, dqe::theoretical_dqe))
        .draw(output)?;
    Ok(())
}
#[cfg(not(feature = "plot"))]
fn plot(_: &Curve, _: &Curve, _: &Curve, output: &std::path::Path) -> anyhow::Result<()> {
    log::warn!("built without the `plot` feature, {:?} not written", output);
    Ok(())
}
