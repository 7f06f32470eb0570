//! Micrograph readers
//!
//! Single frames are read from TIFF (`.tif`, `.tiff`) or MRC (`.mrc`, `.mrcs`)
//! files, stacks of frames from MRC files.

use std::{
    io,
    path::{Path, PathBuf},
};

use ndarray::{Array2, Array3, Axis};

mod mrc;
mod tiff;
pub use mrc::{Mrc, MrcHeader, MrcMode};

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("unsupported file extension {0:?} (only TIF or MRC)")]
    UnsupportedExtension(PathBuf),
    #[error("failed to read {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("failed to decode TIFF image")]
    Tiff(#[from] image::ImageError),
    #[error("unsupported MRC mode {0}")]
    MrcMode(i32),
    #[error("invalid MRC dimensions ({0}, {1}, {2})")]
    MrcDimensions(i32, i32, i32),
    #[error("failed to read MRC data")]
    MrcData(#[from] io::Error),
    #[error("empty stack")]
    EmptyStack,
    #[error("image data does not match its header shape")]
    Shape(#[from] ndarray::ShapeError),
}
type Result<T> = std::result::Result<T, ImageError>;

/// Supported micrograph file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Tiff,
    Mrc,
}
impl Format {
    /// Guess the file format from the file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .as_deref()
        {
            Some("tif") | Some("tiff") => Ok(Format::Tiff),
            Some("mrc") | Some("mrcs") => Ok(Format::Mrc),
            _ => Err(ImageError::UnsupportedExtension(path.to_path_buf())),
        }
    }
}

/// Loads a single frame, the first frame is returned if the file holds a stack
pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let path = path.as_ref();
    log::info!("Loading {:?}...", path);
    match Format::from_path(path)? {
        Format::Tiff => tiff::load(path),
        Format::Mrc => {
            let mrc = Mrc::open(path)?;
            if mrc.is_image_stack() {
                log::warn!("Image stack, only reading first frame.");
            } else if mrc.is_volume() {
                log::warn!("Volume (space group {}), only reading first section.", mrc.header.ispg);
            }
            Ok(mrc.into_frames().index_axis_move(Axis(0), 0))
        }
    }
}

/// Loads a stack of frames, a TIFF image is returned as a one-frame stack
pub fn load_stack<P: AsRef<Path>>(path: P) -> Result<Array3<f64>> {
    let path = path.as_ref();
    log::info!("Loading {:?}...", path);
    let frames = match Format::from_path(path)? {
        Format::Tiff => tiff::load(path)?.insert_axis(Axis(0)),
        Format::Mrc => {
            let mrc = Mrc::open(path)?;
            if mrc.is_volume() {
                log::warn!("Volume (space group {}), reading its sections as frames.", mrc.header.ispg);
            }
            mrc.into_frames()
        }
    };
    if frames.len_of(Axis(0)) == 0 {
        return Err(ImageError::EmptyStack);
    }
    log::info!("... {} frame(s) of {:?}", frames.len_of(Axis(0)), &frames.shape()[1..]);
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats() {
        assert_eq!(Format::from_path("edge.tif").unwrap(), Format::Tiff);
        assert_eq!(Format::from_path("edge.TIFF").unwrap(), Format::Tiff);
        assert_eq!(Format::from_path("flat.mrcs").unwrap(), Format::Mrc);
        assert!(matches!(
            Format::from_path("edge.png"),
            Err(ImageError::UnsupportedExtension(_))
        ));
        assert!(Format::from_path("edge").is_err());
    }

    #[test]
    fn first_frame_of_a_stack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.mrcs");
        let frames = Array3::from_shape_fn((3, 4, 5), |(k, i, j)| (k * 100 + i * 10 + j) as f32);
        Mrc::save(&path, frames.view()).unwrap();
        let frame = load_frame(&path).unwrap();
        assert_eq!(frame.dim(), (4, 5));
        assert_eq!(frame[[2, 3]], 23.);
        let stack = load_stack(&path).unwrap();
        assert_eq!(stack.dim(), (3, 4, 5));
        assert_eq!(stack[[2, 1, 4]], 214.);
    }
}
