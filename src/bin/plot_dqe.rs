use std::path::PathBuf;

use mtf_nps_dqe::{
    dqe::theoretical_dqe,
    plot::{Figure, LineKind, Series},
    published::PublishedSource,
    Curve, Metric,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "plot_dqe", about = "Plots measured and published DQE curves")]
struct Opt {
    /// Measured DQE curves (.npz)
    #[structopt(long, parse(from_os_str))]
    input: Vec<PathBuf>,
    /// Published DQE curves as CSV columns (FILE.csv:COLUMN)
    #[structopt(long)]
    published: Vec<PublishedSource>,
    /// Output image (.svg or .png)
    #[structopt(long, parse(from_os_str), default_value = "dqe.svg")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut figure = Figure::new("DQE").x_range(0f64..1f64).y_range(0f64..1.1f64);
    for path in &opt.input {
        let curve = Curve::load(path, Metric::Dqe)?;
        let label = curve.label_or_file_name(path);
        figure = figure.series(Series::from_curve(&curve, label, LineKind::Measured));
    }
    figure = figure.series(Series::from_fn("Theoretical", 0f64..1f64, theoretical_dqe));
    for source in &opt.published {
        let curve = source.load(Metric::Dqe)?;
        let label = curve.label.clone().unwrap_or_else(|| source.to_string());
        figure = figure.series(Series::from_curve(&curve, label, LineKind::Published));
    }
    figure.draw(&opt.output)?;
    Ok(())
}
