//! Detective quantum efficiency
//!
//! `DQE(w) = DQE(0)·MTF(w)²/NNPS(w)` (McMullan et al. 2009, eq. 4), computed
//! at the frequencies of the NPS curve.

use std::path::Path;

use crate::curve::{file_name, interp, Curve, CurveError, Metric};

#[derive(Debug, thiserror::Error)]
pub enum DqeError {
    #[error("expected a {expected} curve, found a {found} curve")]
    Metric { expected: Metric, found: Metric },
    #[error("empty {0} curve")]
    Empty(Metric),
    #[error(transparent)]
    Curve(#[from] CurveError),
}
type Result<T> = std::result::Result<T, DqeError>;

/// Default DQE at zero frequency
pub const DQE0: f64 = 0.95;

/// DQE of a perfect counting detector with square pixels, `sinc²(πw/2)`
pub fn theoretical_dqe(w: f64) -> f64 {
    crate::mtf::theoretical_mtf(w).powi(2)
}

/// Curve label: `name`, or the file name of `store`, or both input file names
pub fn label<P, Q, R>(name: Option<&str>, store: Option<P>, mtf: Q, nps: R) -> String
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    match (name, store) {
        (Some(name), _) => name.to_string(),
        (None, Some(store)) => file_name(store),
        (None, None) => format!("MTF: {}, NPS: {}", file_name(mtf), file_name(nps)),
    }
}

/// DQE from a MTF and a NPS curve
///
/// The MTF is linearly interpolated at the NPS frequencies and clamped to its
/// end values beyond its frequency range.
pub fn calculate(mtf: &Curve, nps: &Curve, dqe0: f64) -> Result<Curve> {
    for (curve, expected) in [(mtf, Metric::Mtf), (nps, Metric::Nps)] {
        if curve.metric != expected {
            return Err(DqeError::Metric {
                expected,
                found: curve.metric,
            });
        }
        if curve.is_empty() {
            return Err(DqeError::Empty(expected));
        }
    }
    let values = nps
        .points()
        .map(|(w, nnps)| {
            let mtf = interp(w, &mtf.w, &mtf.values);
            dqe0 * mtf * mtf / nnps
        })
        .collect();
    let dqe = Curve::new(Metric::Dqe, nps.w.clone(), values)?;
    log::info!("DQE(0): {:.3}", dqe.at(0f64));
    log::info!("DQE(0.5 Nyquist): {:.3}", dqe.at(0.5));
    log::info!("DQE(1 Nyquist): {:.3}", dqe.at(1.0));
    Ok(dqe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_2_PI;

    #[test]
    fn perfect_detector() {
        assert_eq!(theoretical_dqe(0.), 1.);
        assert_abs_diff_eq!(theoretical_dqe(1.), FRAC_2_PI * FRAC_2_PI, epsilon = 1e-12);
        assert_abs_diff_eq!(theoretical_dqe(2.), 0., epsilon = 1e-12);
    }

    #[test]
    fn dqe_at_nps_frequencies() {
        let mtf = Curve::new(Metric::Mtf, vec![0., 1.], vec![1., 0.5]).unwrap();
        let nps = Curve::new(Metric::Nps, vec![0., 0.5, 1., 1.4], vec![1., 0.5, 0.25, 0.25])
            .unwrap();
        let dqe = calculate(&mtf, &nps, DQE0).unwrap();
        assert_eq!(dqe.metric, Metric::Dqe);
        assert_eq!(dqe.w, nps.w);
        assert_abs_diff_eq!(dqe.values[0], 0.95);
        assert_abs_diff_eq!(dqe.values[1], 0.95 * 0.75 * 0.75 / 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(dqe.values[2], 0.95, epsilon = 1e-12);
        // clamped beyond the last MTF frequency
        assert_abs_diff_eq!(dqe.values[3], 0.95, epsilon = 1e-12);
    }

    #[test]
    fn swapped_curves() {
        let mtf = Curve::new(Metric::Mtf, vec![0., 1.], vec![1., 0.5]).unwrap();
        assert!(matches!(
            calculate(&mtf, &mtf, DQE0),
            Err(DqeError::Metric {
                expected: Metric::Nps,
                ..
            })
        ));
    }

    #[test]
    fn labels() {
        assert_eq!(label(Some("K3"), Some("dqe.npz"), "a", "b"), "K3");
        assert_eq!(label(None, Some("out/dqe_k3.npz"), "a", "b"), "dqe_k3.npz");
        assert_eq!(
            label::<&str, _, _>(None, None, "data/mtf.npz", "data/nps.npz"),
            "MTF: mtf.npz, NPS: nps.npz"
        );
    }
}
