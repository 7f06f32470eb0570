//! # MTF, NPS and DQE of electron detectors
//!
//! The modulation transfer function ([mtf]) is measured from the image of a
//! straight edge, the noise power spectrum ([nps]) from a stack of flat
//! fields and the detective quantum efficiency ([dqe]) is derived from both.
//! Measured curves are stored as `.npz` archives ([curve]) and can be
//! compared with published curves ([published]).
//!
//! Edges and flat fields can also be simulated ([simulate]) with optional
//! Fourier binning ([fourier]) to check the measurements against known
//! detector responses.

pub mod curve;
pub mod dqe;
mod error;
pub mod fit;
pub mod fourier;
pub mod io;
pub mod mtf;
pub mod nps;
#[cfg(feature = "plot")]
pub mod plot;
pub mod published;
pub mod simulate;
pub mod spatial;

pub use curve::{Curve, Metric};
pub use error::{Error, Result};
pub use mtf::CropRegion;
pub use simulate::SimulationConfig;
