use std::{fs, path::PathBuf};

use anyhow::Context;
use mtf_nps_dqe::{published::star_mtf, Curve, Metric};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "star_mtf", about = "Converts a MTF curve into a RELION STAR file")]
struct Opt {
    /// Measured MTF curve (.npz)
    #[structopt(parse(from_os_str))]
    file: PathBuf,
    /// Output STAR file, printed if none is given
    #[structopt(long, parse(from_os_str))]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let curve = Curve::load(&opt.file, Metric::Mtf)?;
    let star = star_mtf(&curve);
    match &opt.output {
        Some(output) => {
            fs::write(output, star).with_context(|| format!("writing {:?}", output))?;
            log::info!("STAR file written to {:?}", output);
        }
        None => print!("{}", star),
    }
    Ok(())
}
