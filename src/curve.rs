//! Measured curves
//!
//! A [Curve] is a sampled metric, MTF, NPS or DQE, against the spatial
//! frequency in fraction of Nyquist.
//! Curves are stored in `.npz` archives with the arrays `w`, the metric name
//! and an optional `label` byte string.

use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

use npyz::{npz::NpzArchive, npz::NpzWriter, DType, TypeStr, WriterBuilder};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

#[derive(Debug, thiserror::Error)]
pub enum CurveError {
    #[error("failed to access curve archive")]
    Io(#[from] io::Error),
    #[error("array {0:?} not found in {1:?}")]
    Missing(String, PathBuf),
    #[error("no metric array (mtf, nps or dqe) found in {0:?}")]
    UnknownMetric(PathBuf),
    #[error("frequencies ({w}) and values ({values}) have different lengths")]
    Length { w: usize, values: usize },
    #[error("frequencies must be non-decreasing")]
    NotSorted,
    #[error("invalid npy type {0:?}")]
    TypeStr(String),
}
type Result<T> = std::result::Result<T, CurveError>;

/// Curve metric, its name is the archive array name
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, AsRefStr, Default,
)]
#[strum(serialize_all = "lowercase")]
pub enum Metric {
    #[default]
    Mtf,
    Nps,
    Dqe,
}

/// Linear interpolation of `(xp, fp)` at `x`, clamped to the end values outside of `xp`
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    match (xp.first(), xp.last()) {
        (Some(&first), Some(&last)) => {
            if x <= first {
                return fp[0];
            }
            if x >= last {
                return fp[xp.len() - 1];
            }
            let i = xp.partition_point(|&v| v <= x);
            let (x0, x1) = (xp[i - 1], xp[i]);
            let (f0, f1) = (fp[i - 1], fp[i]);
            if x1 == x0 {
                f1
            } else {
                f0 + (x - x0) * (f1 - f0) / (x1 - x0)
            }
        }
        _ => f64::NAN,
    }
}

/// A metric sampled at increasing spatial frequencies
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub metric: Metric,
    pub w: Vec<f64>,
    pub values: Vec<f64>,
    pub label: Option<String>,
}
impl Curve {
    pub fn new(metric: Metric, w: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if w.len() != values.len() {
            return Err(CurveError::Length {
                w: w.len(),
                values: values.len(),
            });
        }
        if w.windows(2).any(|w| w[1] < w[0]) {
            return Err(CurveError::NotSorted);
        }
        Ok(Self {
            metric,
            w,
            values,
            label: None,
        })
    }
    pub fn with_label<S: Into<String>>(self, label: S) -> Self {
        Self {
            label: Some(label.into()),
            ..self
        }
    }
    pub fn len(&self) -> usize {
        self.w.len()
    }
    pub fn is_empty(&self) -> bool {
        self.w.is_empty()
    }
    /// Value at frequency `w` (linear interpolation)
    pub fn at(&self, w: f64) -> f64 {
        interp(w, &self.w, &self.values)
    }
    /// Curve points `(w, value)`
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.w.iter().cloned().zip(self.values.iter().cloned())
    }

    /// Writes the curve archive, `.npz` is appended to the file name if missing
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let path = npz_path(path.as_ref());
        let mut npz = NpzWriter::create(&path)?;
        for (name, data) in [("w", &self.w), (self.metric.as_ref(), &self.values)] {
            let mut writer = npz
                .array(name, Default::default())
                .map_err(io::Error::from)?
                .default_dtype()
                .shape(&[data.len() as u64])
                .begin_nd()?;
            writer.extend(data.iter().cloned())?;
            writer.finish()?;
        }
        if let Some(label) = &self.label {
            let bytes = label.as_bytes().to_vec();
            let type_str = format!("|S{}", bytes.len().max(1))
                .parse::<TypeStr>()
                .map_err(|e| CurveError::TypeStr(e.to_string()))?;
            let mut writer = npz
                .array("label", Default::default())
                .map_err(io::Error::from)?
                .dtype(DType::Plain(type_str))
                .shape(&[1])
                .begin_nd()?;
            writer.push(&bytes)?;
            writer.finish()?;
        }
        log::info!("{} curve stored in {:?}", self.metric.as_ref().to_uppercase(), path);
        Ok(path)
    }

    /// Reads the curve of the given metric from an archive
    pub fn load<P: AsRef<Path>>(path: P, metric: Metric) -> Result<Self> {
        let path = path.as_ref();
        let mut npz = NpzArchive::open(path)?;
        let mut read = |name: &str| -> Result<Vec<f64>> {
            npz.by_name(name)?
                .ok_or_else(|| CurveError::Missing(name.to_string(), path.to_path_buf()))?
                .into_vec::<f64>()
                .map_err(CurveError::from)
        };
        let w = read("w")?;
        let values = read(metric.as_ref())?;
        let label = match npz.by_name("label") {
            Ok(Some(npy)) => match npy.into_vec::<Vec<u8>>() {
                Ok(bytes) => bytes
                    .into_iter()
                    .next()
                    .map(|b| String::from_utf8_lossy(&b).trim_end_matches('\0').to_string()),
                Err(e) => {
                    log::warn!("ignoring unreadable label of {:?}: {}", path, e);
                    None
                }
            },
            _ => None,
        };
        Ok(Self {
            label,
            ..Self::new(metric, w, values)?
        })
    }

    /// Reads a curve archive, the metric is given by the array names
    pub fn load_any<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let names = NpzArchive::open(path)?
            .array_names()
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        let metric = Metric::iter()
            .find(|metric| names.iter().any(|name| name == metric.as_ref()))
            .ok_or_else(|| CurveError::UnknownMetric(path.to_path_buf()))?;
        Self::load(path, metric)
    }

    /// The curve label, or the file name of `path`
    pub fn label_or_file_name<P: AsRef<Path>>(&self, path: P) -> String {
        self.label.clone().unwrap_or_else(|| file_name(path))
    }
}

/// File name of a path as a string
pub fn file_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn npz_path(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == "npz" => path.to_path_buf(),
        _ => {
            let mut name = OsString::from(path.as_os_str());
            name.push(".npz");
            PathBuf::from(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn metric_names() {
        assert_eq!(Metric::Nps.to_string(), "nps");
        assert_eq!(Metric::from_str("dqe").unwrap(), Metric::Dqe);
        assert_eq!(Metric::Mtf.as_ref(), "mtf");
    }

    #[test]
    fn clamped_interpolation() {
        let xp = [0., 1., 2.];
        let fp = [1., 0.5, 0.];
        assert_eq!(interp(-1., &xp, &fp), 1.);
        assert_eq!(interp(0.5, &xp, &fp), 0.75);
        assert_eq!(interp(1., &xp, &fp), 0.5);
        assert_eq!(interp(3., &xp, &fp), 0.);
        assert!(interp(1., &[], &[]).is_nan());
    }

    #[test]
    fn invalid_curves() {
        assert!(matches!(
            Curve::new(Metric::Mtf, vec![0., 1.], vec![1.]),
            Err(CurveError::Length { .. })
        ));
        assert!(matches!(
            Curve::new(Metric::Mtf, vec![1., 0.], vec![1., 1.]),
            Err(CurveError::NotSorted)
        ));
    }

    #[test]
    fn archive() {
        let dir = tempfile::tempdir().unwrap();
        let curve = Curve::new(Metric::Dqe, vec![0., 0.5, 1.], vec![0.9, 0.5, 0.2])
            .unwrap()
            .with_label("Falcon 4i");
        let path = curve.save(dir.path().join("dqe")).unwrap();
        assert_eq!(path, dir.path().join("dqe.npz"));
        assert_eq!(Curve::load(&path, Metric::Dqe).unwrap(), curve);
        assert_eq!(Curve::load_any(&path).unwrap(), curve);
        assert!(matches!(
            Curve::load(&path, Metric::Mtf),
            Err(CurveError::Missing(..))
        ));
    }

    #[test]
    fn unlabelled_archive() {
        let dir = tempfile::tempdir().unwrap();
        let curve = Curve::new(Metric::Nps, vec![0., 1.], vec![1., 0.8]).unwrap();
        let path = curve.save(dir.path().join("nps.npz")).unwrap();
        let loaded = Curve::load_any(&path).unwrap();
        assert_eq!(loaded.label, None);
        assert_eq!(loaded.label_or_file_name(&path), "nps.npz");
    }
}
