use crate::{
    curve::CurveError, dqe::DqeError, fit::FitError, fourier::FourierError, io::ImageError,
    mtf::MtfError, nps::NpsError, published::PublishedError, simulate::SimulationError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `fourier` module")]
    Fourier(#[from] FourierError),
    #[error("Error in the `io` module")]
    Image(#[from] ImageError),
    #[error("Error in the `fit` module")]
    Fit(#[from] FitError),
    #[error("Error in the `curve` module")]
    Curve(#[from] CurveError),
    #[error("Error in the `published` module")]
    Published(#[from] PublishedError),
    #[error("Error in the `simulate` module")]
    Simulation(#[from] SimulationError),
    #[error("Error in the `mtf` module")]
    Mtf(#[from] MtfError),
    #[error("Error in the `nps` module")]
    Nps(#[from] NpsError),
    #[error("Error in the `dqe` module")]
    Dqe(#[from] DqeError),
    #[cfg(feature = "plot")]
    #[error("Error in the `plot` module")]
    Plot(#[from] crate::plot::PlotError),
}
pub type Result<T> = std::result::Result<T, Error>;
