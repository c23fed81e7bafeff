//! In-memory raster grids
//!
//! Samples are held as `(row, column, band)` arrays. The element type
//! follows the source product, so the grid is an enum over the supported
//! sample types and most operations dispatch through `with_grid!` or
//! `map_grid!`.

use std::fmt;

use ndarray::{s, Array3, Axis};

use crate::tiff::constants::sample_format;
use crate::tiff::errors::{TiffError, TiffResult};

/// Element type of a raster grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl SampleType {
    /// Sample type for a TIFF BitsPerSample / SampleFormat pair
    pub fn from_tiff(bits: u16, format: u16) -> TiffResult<Self> {
        match (bits, format) {
            (8, sample_format::UNSIGNED) => Ok(SampleType::U8),
            (16, sample_format::UNSIGNED) => Ok(SampleType::U16),
            (16, sample_format::SIGNED) => Ok(SampleType::I16),
            (32, sample_format::UNSIGNED) => Ok(SampleType::U32),
            (32, sample_format::SIGNED) => Ok(SampleType::I32),
            (32, sample_format::IEEEFP) => Ok(SampleType::F32),
            (64, sample_format::IEEEFP) => Ok(SampleType::F64),
            _ => Err(TiffError::UnsupportedSampleLayout { bits, format }),
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::U16 | SampleType::I16 => 2,
            SampleType::U32 | SampleType::I32 | SampleType::F32 => 4,
            SampleType::F64 => 8,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleType::U8 => "u8",
            SampleType::U16 => "u16",
            SampleType::I16 => "i16",
            SampleType::U32 => "u32",
            SampleType::I32 => "i32",
            SampleType::F32 => "f32",
            SampleType::F64 => "f64",
        };
        write!(f, "{}", name)
    }
}

/// Sample storage, one variant per sample type
#[derive(Debug, Clone, PartialEq)]
pub enum GridData {
    U8(Array3<u8>),
    U16(Array3<u16>),
    I16(Array3<i16>),
    U32(Array3<u32>),
    I32(Array3<i32>),
    F32(Array3<f32>),
    F64(Array3<f64>),
}

/// Evaluates `$body` with `$arr` bound to the typed array of any variant
macro_rules! with_grid {
    ($data:expr, $arr:ident => $body:expr) => {
        match $data {
            $crate::raster::grid::GridData::U8($arr) => $body,
            $crate::raster::grid::GridData::U16($arr) => $body,
            $crate::raster::grid::GridData::I16($arr) => $body,
            $crate::raster::grid::GridData::U32($arr) => $body,
            $crate::raster::grid::GridData::I32($arr) => $body,
            $crate::raster::grid::GridData::F32($arr) => $body,
            $crate::raster::grid::GridData::F64($arr) => $body,
        }
    };
}

/// Like `with_grid!`, rewrapping the resulting array in the same variant
macro_rules! map_grid {
    ($data:expr, $arr:ident => $body:expr) => {
        match $data {
            $crate::raster::grid::GridData::U8($arr) => $crate::raster::grid::GridData::U8($body),
            $crate::raster::grid::GridData::U16($arr) => $crate::raster::grid::GridData::U16($body),
            $crate::raster::grid::GridData::I16($arr) => $crate::raster::grid::GridData::I16($body),
            $crate::raster::grid::GridData::U32($arr) => $crate::raster::grid::GridData::U32($body),
            $crate::raster::grid::GridData::I32($arr) => $crate::raster::grid::GridData::I32($body),
            $crate::raster::grid::GridData::F32($arr) => $crate::raster::grid::GridData::F32($body),
            $crate::raster::grid::GridData::F64($arr) => $crate::raster::grid::GridData::F64($body),
        }
    };
}

pub(crate) use map_grid;
pub(crate) use with_grid;

macro_rules! impl_from_array {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Array3<$ty>> for RasterGrid {
                fn from(array: Array3<$ty>) -> Self {
                    RasterGrid { data: GridData::$variant(array) }
                }
            }
        )*
    };
}

/// A raster of `height` x `width` pixels with `bands` samples each
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    data: GridData,
}

impl_from_array!(u8 => U8, u16 => U16, i16 => I16, u32 => U32, i32 => I32, f32 => F32, f64 => F64);

impl RasterGrid {
    pub fn new(data: GridData) -> Self {
        RasterGrid { data }
    }

    pub fn data(&self) -> &GridData {
        &self.data
    }

    /// (height, width, bands)
    pub fn shape(&self) -> (usize, usize, usize) {
        with_grid!(&self.data, a => a.dim())
    }

    pub fn height(&self) -> usize {
        self.shape().0
    }

    pub fn width(&self) -> usize {
        self.shape().1
    }

    pub fn bands(&self) -> usize {
        self.shape().2
    }

    pub fn is_empty(&self) -> bool {
        let (h, w, b) = self.shape();
        h == 0 || w == 0 || b == 0
    }

    pub fn sample_type(&self) -> SampleType {
        match &self.data {
            GridData::U8(_) => SampleType::U8,
            GridData::U16(_) => SampleType::U16,
            GridData::I16(_) => SampleType::I16,
            GridData::U32(_) => SampleType::U32,
            GridData::I32(_) => SampleType::I32,
            GridData::F32(_) => SampleType::F32,
            GridData::F64(_) => SampleType::F64,
        }
    }

    /// Copy of the half-open pixel window rows `y0..y1`, columns `x0..x1`
    ///
    /// The caller guarantees the window lies inside the grid.
    pub fn crop(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> RasterGrid {
        RasterGrid::new(map_grid!(&self.data, a => a.slice(s![y0..y1, x0..x1, ..]).to_owned()))
    }

    /// New grid whose row `i` is source row `rows[i]` and column `j` is
    /// source column `cols[j]`
    pub fn select(&self, rows: &[usize], cols: &[usize]) -> RasterGrid {
        RasterGrid::new(map_grid!(&self.data, a => a.select(Axis(0), rows).select(Axis(1), cols)))
    }

    /// The u8 array of an 8-bit grid
    pub fn as_u8(&self) -> Option<&Array3<u8>> {
        match &self.data {
            GridData::U8(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for RasterGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, w, b) = self.shape();
        write!(f, "{}x{}x{} {}", h, w, b, self.sample_type())
    }
}
