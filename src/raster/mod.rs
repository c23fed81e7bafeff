//! Source rasters: decoding, georeferencing and the in-memory grid

pub mod decoder;
pub mod georef;
pub mod grid;
pub mod source;

pub use decoder::{ImageLayout, RasterDecoder};
pub use georef::{GeoKeyBlock, GeoReference, WindowTransform};
pub use grid::{GridData, RasterGrid, SampleType};
pub use source::{RasterSource, SourceFormat};
