use std::path::PathBuf;

use mtf_nps_dqe::{
    curve::file_name,
    plot::{Figure, LineKind, Series},
    Curve, Metric,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "plot_nps", about = "Plots measured NPS curves")]
struct Opt {
    /// Measured NPS curves (.npz)
    #[structopt(long, parse(from_os_str), required = true)]
    input: Vec<PathBuf>,
    /// Output image (.svg or .png)
    #[structopt(long, parse(from_os_str), default_value = "nps.svg")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let figure = opt
        .input
        .iter()
        .map(|path| -> anyhow::Result<Series> {
            let curve = Curve::load(path, Metric::Nps)?;
            Ok(Series::from_curve(&curve, file_name(path), LineKind::Measured))
        })
        .try_fold(
            Figure::new("NPS").x_range(0f64..1f64).y_range(0f64..1.1f64),
            |figure, series| series.map(|series| figure.series(series)),
        )?;
    figure.draw(&opt.output)?;
    Ok(())
}
