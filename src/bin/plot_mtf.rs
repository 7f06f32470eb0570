use std::path::PathBuf;

use mtf_nps_dqe::{
    curve::file_name,
    mtf::theoretical_mtf,
    plot::{Figure, LineKind, Series},
    published::PublishedSource,
    Curve, Metric,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "plot_mtf", about = "Plots measured and published MTF curves")]
struct Opt {
    /// Measured MTF curves (.npz)
    #[structopt(long, parse(from_os_str))]
    input: Vec<PathBuf>,
    /// Published MTF curves: STAR files or CSV columns (FILE.csv:COLUMN)
    #[structopt(long)]
    published: Vec<PublishedSource>,
    /// Output image (.svg or .png)
    #[structopt(long, parse(from_os_str), default_value = "mtf.svg")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut figure = Figure::new("MTF").x_range(0f64..1f64).y_range(0f64..1.1f64);
    for path in &opt.input {
        let curve = Curve::load(path, Metric::Mtf)?;
        figure = figure.series(Series::from_curve(&curve, file_name(path), LineKind::Measured));
    }
    figure = figure.series(Series::from_fn("Theoretical", 0f64..1.1f64, theoretical_mtf));
    for source in &opt.published {
        let curve = source.load(Metric::Mtf)?;
        let label = curve.label.clone().unwrap_or_else(|| source.to_string());
        figure = figure.series(Series::from_curve(&curve, label, LineKind::Published));
    }
    figure.draw(&opt.output)?;
    Ok(())
}
