// MRC file format, see https://www.ccpem.ac.uk/mrc_format/mrc2014.php

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt, LE};
use ndarray::{Array3, ArrayView3};

use super::{ImageError, Result};

const HEADER_LEN: usize = 1024;

/// MRC data modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MrcMode {
    Int8,
    Int16,
    Float32,
    UInt16,
}
impl TryFrom<i32> for MrcMode {
    type Error = ImageError;
    fn try_from(mode: i32) -> Result<Self> {
        match mode {
            0 => Ok(MrcMode::Int8),
            1 => Ok(MrcMode::Int16),
            2 => Ok(MrcMode::Float32),
            6 => Ok(MrcMode::UInt16),
            _ => Err(ImageError::MrcMode(mode)),
        }
    }
}

/// The subset of the 1024 bytes MRC header needed to read the data block
#[derive(Debug, Clone)]
pub struct MrcHeader {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub mode: MrcMode,
    pub ispg: i32,
    pub nsymbt: usize,
    pub little_endian: bool,
}
impl MrcHeader {
    fn parse<B: ByteOrder>(buffer: &[u8], little_endian: bool) -> Result<Self> {
        let word = |k: usize| B::read_i32(&buffer[4 * k..4 * k + 4]);
        let (nx, ny, nz) = (word(0), word(1), word(2));
        if nx <= 0 || ny <= 0 || nz < 0 {
            return Err(ImageError::MrcDimensions(nx, ny, nz));
        }
        Ok(Self {
            nx: nx as usize,
            ny: ny as usize,
            nz: nz.max(1) as usize,
            mode: MrcMode::try_from(word(3))?,
            ispg: word(22),
            nsymbt: word(23).max(0) as usize,
            little_endian,
        })
    }
    /// Reads the header, the byte order is given by the machine stamp
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; HEADER_LEN];
        reader.read_exact(&mut buffer)?;
        // machine stamp: 0x44 0x41 or 0x44 0x44 little endian, 0x11 0x11 big endian
        if buffer[212] == 0x11 && buffer[213] == 0x11 {
            Self::parse::<BigEndian>(&buffer, false)
        } else {
            Self::parse::<LittleEndian>(&buffer, true)
        }
    }
}

/// MRC image or image stack
#[derive(Debug)]
pub struct Mrc {
    pub header: MrcHeader,
    data: Array3<f64>,
}
impl Mrc {
    /// Reads a MRC file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ImageError::Io(e, path.to_path_buf()))?;
        Self::read(&mut BufReader::new(file))
    }
    /// Reads a MRC header and data block
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let header = MrcHeader::read(reader)?;
        log::debug!("{:?}", header);
        std::io::copy(
            &mut reader.by_ref().take(header.nsymbt as u64),
            &mut std::io::sink(),
        )?;
        let values = if header.little_endian {
            read_values::<LittleEndian, R>(reader, &header)?
        } else {
            read_values::<BigEndian, R>(reader, &header)?
        };
        let data = Array3::from_shape_vec((header.nz, header.ny, header.nx), values)?;
        Ok(Self { header, data })
    }
    /// Several frames in the file, with the image stack space group 0
    pub fn is_image_stack(&self) -> bool {
        self.header.ispg == 0 && self.header.nz > 1
    }
    /// Several sections of a crystallographic volume, space group other than 0
    pub fn is_volume(&self) -> bool {
        self.header.ispg != 0 && self.header.nz > 1
    }
    /// Returns the data as `(frames, rows, columns)`
    pub fn into_frames(self) -> Array3<f64> {
        self.data
    }
    /// Writes a little endian float32 image stack
    pub fn save<P: AsRef<Path>>(path: P, frames: ArrayView3<f32>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ImageError::Io(e, path.to_path_buf()))?;
        let mut writer = BufWriter::new(file);
        let (nz, ny, nx) = frames.dim();
        let (min, max, sum) = frames.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0f64),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v as f64),
        );
        let mean = (sum / frames.len().max(1) as f64) as f32;

        // words 1-4: dimensions and mode 2
        for n in [nx, ny, nz] {
            writer.write_i32::<LE>(n as i32)?;
        }
        writer.write_i32::<LE>(2)?;
        // words 5-7: start indices
        writer.write_all(&[0u8; 12])?;
        // words 8-10: sampling, words 11-13: cell size, words 14-16: cell angles
        for n in [nx, ny, nz] {
            writer.write_i32::<LE>(n as i32)?;
        }
        for n in [nx, ny, nz] {
            writer.write_f32::<LE>(n as f32)?;
        }
        for _ in 0..3 {
            writer.write_f32::<LE>(90.)?;
        }
        // words 17-19: axis mapping
        for axis in 1..=3 {
            writer.write_i32::<LE>(axis)?;
        }
        // words 20-22: statistics
        for v in [min, max, mean] {
            writer.write_f32::<LE>(v)?;
        }
        // word 23: space group (image stack), word 24: no extended header
        writer.write_i32::<LE>(0)?;
        writer.write_i32::<LE>(0)?;
        // skip to word 53
        writer.write_all(&[0u8; 4 * (52 - 24)])?;
        writer.write_all(b"MAP ")?;
        writer.write_all(&[0x44, 0x44, 0x00, 0x00])?;
        // skip to the end of the header
        writer.write_all(&[0u8; HEADER_LEN - 4 * 54])?;

        for &v in frames.iter() {
            writer.write_f32::<LE>(v)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn read_values<B: ByteOrder, R: Read>(reader: &mut R, header: &MrcHeader) -> Result<Vec<f64>> {
    let n = header.nx * header.ny * header.nz;
    Ok(match header.mode {
        MrcMode::Int8 => {
            let mut buffer = vec![0i8; n];
            reader.read_i8_into(&mut buffer)?;
            buffer.into_iter().map(f64::from).collect()
        }
        MrcMode::Int16 => {
            let mut buffer = vec![0i16; n];
            reader.read_i16_into::<B>(&mut buffer)?;
            buffer.into_iter().map(f64::from).collect()
        }
        MrcMode::Float32 => {
            let mut buffer = vec![0f32; n];
            reader.read_f32_into::<B>(&mut buffer)?;
            buffer.into_iter().map(f64::from).collect()
        }
        MrcMode::UInt16 => {
            let mut buffer = vec![0u16; n];
            reader.read_u16_into::<B>(&mut buffer)?;
            buffer.into_iter().map(f64::from).collect()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header<B: ByteOrder>(nx: i32, ny: i32, nz: i32, mode: i32, nsymbt: i32) -> Vec<u8> {
        let mut buffer = vec![0u8; HEADER_LEN];
        B::write_i32(&mut buffer[0..4], nx);
        B::write_i32(&mut buffer[4..8], ny);
        B::write_i32(&mut buffer[8..12], nz);
        B::write_i32(&mut buffer[12..16], mode);
        B::write_i32(&mut buffer[92..96], nsymbt);
        buffer
    }

    #[test]
    fn big_endian_int16_with_extended_header() {
        let mut bytes = header::<BigEndian>(3, 2, 1, 1, 8);
        bytes[212] = 0x11;
        bytes[213] = 0x11;
        bytes.extend_from_slice(&[0xff; 8]);
        for v in [-3i16, -2, -1, 0, 1, 2] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        let mrc = Mrc::read(&mut Cursor::new(bytes)).unwrap();
        assert!(!mrc.header.little_endian);
        assert!(!mrc.is_image_stack());
        let data = mrc.into_frames();
        assert_eq!(data.dim(), (1, 2, 3));
        assert_eq!(data[[0, 1, 0]], 0.);
        assert_eq!(data[[0, 0, 0]], -3.);
    }

    #[test]
    fn little_endian_uint16() {
        let mut bytes = header::<LittleEndian>(2, 2, 2, 6, 0);
        bytes[212] = 0x44;
        bytes[213] = 0x44;
        for v in 0u16..8 {
            bytes.extend_from_slice(&(v * 1000).to_le_bytes());
        }
        let mrc = Mrc::read(&mut Cursor::new(bytes)).unwrap();
        assert!(mrc.is_image_stack());
        assert_eq!(mrc.into_frames()[[1, 1, 1]], 7000.);
    }

    #[test]
    fn volume_is_not_a_stack() {
        let mut bytes = header::<LittleEndian>(2, 2, 2, 2, 0);
        LittleEndian::write_i32(&mut bytes[88..92], 1);
        bytes[212] = 0x44;
        bytes[213] = 0x44;
        for v in 0..8 {
            bytes.extend_from_slice(&(v as f32).to_le_bytes());
        }
        let mrc = Mrc::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(mrc.header.ispg, 1);
        assert!(!mrc.is_image_stack());
        assert!(mrc.is_volume());
    }

    #[test]
    fn unsupported_mode() {
        let bytes = header::<LittleEndian>(2, 2, 1, 4, 0);
        assert!(matches!(
            Mrc::read(&mut Cursor::new(bytes)),
            Err(ImageError::MrcMode(4))
        ));
    }

    #[test]
    fn truncated_data() {
        let mut bytes = header::<LittleEndian>(4, 4, 1, 2, 0);
        bytes.extend_from_slice(&[0u8; 12]);
        assert!(matches!(
            Mrc::read(&mut Cursor::new(bytes)),
            Err(ImageError::MrcData(_))
        ));
    }

    #[test]
    fn save_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.mrc");
        let frames = Array3::from_shape_fn((1, 3, 4), |(_, i, j)| i as f32 - 0.5 * j as f32);
        Mrc::save(&path, frames.view()).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1024 + 4 * 12);
        let mrc = Mrc::open(&path).unwrap();
        assert_eq!(mrc.header.mode, MrcMode::Float32);
        assert!(mrc.header.little_endian);
        let data = mrc.into_frames();
        assert_eq!(data[[0, 2, 3]], 0.5);
    }
}
