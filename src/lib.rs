//! Pansharpening training-tile preparation
//!
//! Opens a multispectral, a panchromatic and a pansharpened raster of the
//! same footprint, resamples them onto the panchromatic pixel grid, cuts the
//! grid into fixed-size tiles and writes each tile of each role as an 8-bit
//! GeoTIFF. The three files of one tile share a random identifier.

pub mod io;
pub mod tiff;
pub mod utils;
pub mod compression;
pub mod raster;
pub mod tiling;
pub mod export;
pub mod pipeline;
pub mod commands;

pub use pipeline::{PipelineConfig, PipelineDriver, PipelineError, PipelineResult, RunSummary};
pub use raster::{RasterGrid, RasterSource};
pub use tiff::TiffReader;
