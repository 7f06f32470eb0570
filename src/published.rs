//! Published reference curves
//!
//! Vendor and literature curves come either as RELION STAR files (MTF, in
//! cycles/pixel) or as CSV tables with a frequency column `x` in fraction of
//! Nyquist and one column per detector.
//!
//! Bare file names are looked up in the directory given by the
//! `MTF_NPS_DQE_PUBLISHED` environment variable.

use std::{
    collections::HashMap,
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use regex::Regex;

use crate::curve::{file_name, Curve, CurveError, Metric};

pub const PUBLISHED_DIR_ENV: &str = "MTF_NPS_DQE_PUBLISHED";
const STAR_FREQUENCY: &str = "rlnResolutionInversePixel";
const STAR_MTF: &str = "rlnMtfValue";

#[derive(Debug, thiserror::Error)]
pub enum PublishedError {
    #[error("failed to read {1:?}")]
    Io(#[source] std::io::Error, PathBuf),
    #[error("failed to read CSV file")]
    Csv(#[from] csv::Error),
    #[error("column {0:?} not found")]
    MissingColumn(String),
    #[error("invalid STAR data line {0:?}")]
    StarLine(String),
    #[error("a CSV source requires a column name (FILE:COLUMN)")]
    NoColumn,
    #[error("invalid published curve")]
    Curve(#[from] CurveError),
}
type Result<T> = std::result::Result<T, PublishedError>;

/// Resolves a bare file name against the published curves directory
pub fn resolve<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if path.exists() || path.components().count() > 1 {
        return path.to_path_buf();
    }
    match env::var(PUBLISHED_DIR_ENV) {
        Ok(dir) => Path::new(&dir).join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// A STAR data table: the `_rln*` tags and the rows of values
#[derive(Debug, Default, Clone)]
pub struct StarTable {
    pub name: String,
    pub tags: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}
impl StarTable {
    /// Parses the first `loop_` block of a STAR file
    pub fn parse(contents: &str) -> Result<Self> {
        let data_re = Regex::new(r"^data_(\S*)").expect("valid regex");
        let tag_re = Regex::new(r"^_(\w+)").expect("valid regex");
        let mut table = StarTable::default();
        for line in contents.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line == "loop_" {
                continue;
            }
            if let Some(caps) = data_re.captures(line) {
                table.name = caps[1].to_string();
            } else if let Some(caps) = tag_re.captures(line) {
                table.tags.push(caps[1].to_string());
            } else {
                let row = line
                    .split_whitespace()
                    .map(|v| v.parse::<f64>())
                    .collect::<std::result::Result<Vec<f64>, _>>()
                    .map_err(|_| PublishedError::StarLine(line.to_string()))?;
                if row.len() != table.tags.len() {
                    return Err(PublishedError::StarLine(line.to_string()));
                }
                table.rows.push(row);
            }
        }
        Ok(table)
    }
    /// Values of the column with the given tag (without the leading `_`)
    pub fn column(&self, tag: &str) -> Result<Vec<f64>> {
        let idx = self
            .tags
            .iter()
            .position(|t| t == tag)
            .ok_or_else(|| PublishedError::MissingColumn(tag.to_string()))?;
        Ok(self.rows.iter().map(|row| row[idx]).collect())
    }
}

/// Reads a STAR MTF table, frequencies are converted to fraction of Nyquist
pub fn read_star_mtf<P: AsRef<Path>>(path: P) -> Result<Curve> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).map_err(|e| PublishedError::Io(e, path.to_path_buf()))?;
    let table = StarTable::parse(&contents)?;
    let w = table
        .column(STAR_FREQUENCY)?
        .into_iter()
        .map(|w| w * 2f64)
        .collect();
    Ok(Curve::new(Metric::Mtf, w, table.column(STAR_MTF)?)?)
}

/// Formats a MTF curve as a RELION STAR table
///
/// Frequencies are converted to cycles/pixel and only the points up to
/// Nyquist are written, after a leading `0 1` point.
pub fn star_mtf(curve: &Curve) -> String {
    let mut star = format!("data_mtf\nloop_\n_{STAR_FREQUENCY}\n_{STAR_MTF}\n0 1\n");
    curve
        .points()
        .map(|(w, mtf)| (w / 2f64, mtf))
        .filter(|(w, _)| *w <= 0.5)
        .for_each(|(w, mtf)| star.push_str(&format!("{:.6} {:.6}\n", w, mtf)));
    star
}

/// Reads column `column` of a CSV table against its `x` column
///
/// The delimiter is a comma if the header line holds one, a space otherwise.
pub fn read_csv<P: AsRef<Path>>(path: P, column: &str, metric: Metric) -> Result<Curve> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).map_err(|e| PublishedError::Io(e, path.to_path_buf()))?;
    let delimiter = match contents.lines().next() {
        Some(header) if header.contains(',') => b',',
        _ => b' ',
    };
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(contents.as_bytes());
    let headers = rdr.headers()?.clone();
    for name in ["x", column] {
        if !headers.iter().any(|h| h == name) {
            return Err(PublishedError::MissingColumn(name.to_string()));
        }
    }
    let mut points: Vec<(f64, f64)> = vec![];
    for result in rdr.deserialize() {
        let record: HashMap<String, Option<f64>> = result?;
        if let (Some(Some(x)), Some(Some(y))) = (record.get("x"), record.get(column)) {
            points.push((*x, *y));
        }
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (w, values) = points.into_iter().unzip();
    Ok(Curve::new(metric, w, values)?.with_label(column))
}

/// A published curve given as `FILE` (STAR) or `FILE:COLUMN` (CSV)
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedSource {
    pub path: PathBuf,
    pub column: Option<String>,
}
impl FromStr for PublishedSource {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((path, column)) if path.to_lowercase().ends_with(".csv") => Ok(Self {
                path: PathBuf::from(path),
                column: Some(column.to_string()),
            }),
            _ if s.is_empty() => Err("empty published curve source".to_string()),
            _ => Ok(Self {
                path: PathBuf::from(s),
                column: None,
            }),
        }
    }
}
impl fmt::Display for PublishedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "{}:{}", self.path.display(), column),
            None => write!(f, "{}", self.path.display()),
        }
    }
}
impl PublishedSource {
    /// Loads the curve, a STAR file is always a MTF curve
    pub fn load(&self, metric: Metric) -> Result<Curve> {
        let path = resolve(&self.path);
        log::info!("Loading published curve {}", self);
        let is_star = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("star"));
        if is_star {
            let curve = read_star_mtf(&path)?;
            let label = format!("Published {}", file_name(&path));
            Ok(curve.with_label(label))
        } else {
            let column = self.column.as_deref().ok_or(PublishedError::NoColumn)?;
            let curve = read_csv(&path, column, metric)?;
            Ok(curve.with_label(format!("Published {}", column)))
        }
    }
}
