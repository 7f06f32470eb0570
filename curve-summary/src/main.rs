use mtf_nps_dqe::{curve::file_name, Curve};
use serde::Serialize;
use std::{io, path::PathBuf};
use structopt::StructOpt;

/// Spatial frequencies of the summary, in fraction of Nyquist
const FREQUENCIES: [f64; 3] = [0.25, 0.5, 1.0];

#[derive(Debug, StructOpt)]
#[structopt(
    name = "curve-summary",
    about = "Tabulates stored MTF, NPS and DQE curves at a quarter, half and full Nyquist"
)]
struct Opt {
    /// Curve archives (.npz)
    #[structopt(parse(from_os_str), required = true)]
    curves: Vec<PathBuf>,
    /// Writes the table as CSV
    #[structopt(long)]
    csv: bool,
}

#[derive(Debug, Serialize)]
struct Record<'a> {
    file: &'a str,
    metric: &'a str,
    quarter_nyquist: f64,
    half_nyquist: f64,
    nyquist: f64,
    label: Option<&'a str>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let curves = opt
        .curves
        .iter()
        .map(|path| Curve::load_any(path).map(|curve| (file_name(path), curve)))
        .collect::<Result<Vec<_>, _>>()?;

    if opt.csv {
        let mut wtr = csv::Writer::from_writer(io::stdout());
        for (name, curve) in &curves {
            let [quarter_nyquist, half_nyquist, nyquist] = FREQUENCIES.map(|w| curve.at(w));
            wtr.serialize(Record {
                file: name,
                metric: curve.metric.as_ref(),
                quarter_nyquist,
                half_nyquist,
                nyquist,
                label: curve.label.as_deref(),
            })?;
        }
        wtr.flush()?;
        return Ok(());
    }

    let width = curves
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or_default()
        .max(4);
    println!(
        "{:width$} {:>6} {:>8} {:>8} {:>8}",
        "FILE", "METRIC", "0.25", "0.5", "1"
    );
    for (name, curve) in &curves {
        let values: Vec<String> = FREQUENCIES
            .iter()
            .map(|&w| format!("{:>8.3}", curve.at(w)))
            .collect();
        println!(
            "{:width$} {:>6} {}",
            name,
            curve.metric.as_ref(),
            values.join(" ")
        );
        if let Some(label) = &curve.label {
            println!("{:width$} ({})", "", label);
        }
    }
    Ok(())
}
