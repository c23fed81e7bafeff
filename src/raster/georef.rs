//! GeoTIFF georeferencing of a source raster
//!
//! Only the pieces the tile writer needs are kept: the pixel scale, the first
//! tiepoint and the GeoKey directory with its parameter tags. Keys are not
//! interpreted; they are copied verbatim when tiles keep the source CRS.

use log::{debug, warn};

use crate::io::seekable::SeekableReader;
use crate::tiff::constants::tags;
use crate::tiff::errors::TiffResult;
use crate::tiff::ifd::IFD;
use crate::tiff::reader::TiffReader;

/// GeoKey directory and its parameter tags, as stored in the file
#[derive(Debug, Clone, PartialEq)]
pub struct GeoKeyBlock {
    pub directory: Vec<u16>,
    pub double_params: Vec<f64>,
    pub ascii_params: Option<String>,
}

impl GeoKeyBlock {
    /// Number of keys declared in the directory header
    pub fn key_count(&self) -> usize {
        self.directory.get(3).copied().unwrap_or(0) as usize
    }

    /// Header plus exactly one 4-value entry per declared key
    pub fn is_well_formed(&self) -> bool {
        self.directory.len() >= 4 && self.directory.len() == 4 * (self.key_count() + 1)
    }
}

/// Raster-to-model transform of a source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoReference {
    pub pixel_scale: Option<[f64; 3]>,
    pub tiepoint: Option<[f64; 6]>,
    pub geo_keys: Option<GeoKeyBlock>,
}

/// Tiepoint and pixel scale of a tile window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowTransform {
    pub pixel_scale: [f64; 3],
    pub tiepoint: [f64; 6],
}

impl GeoReference {
    /// Reads the georeferencing tags of `ifd`; absent tags stay `None`
    pub fn read(tiff_reader: &TiffReader, reader: &mut dyn SeekableReader, ifd: &IFD) -> TiffResult<Self> {
        let mut georef = GeoReference::default();

        if ifd.has_tag(tags::MODEL_PIXEL_SCALE_TAG) {
            let values = tiff_reader.read_f64_values(reader, ifd, tags::MODEL_PIXEL_SCALE_TAG)?;
            if values.len() >= 2 {
                georef.pixel_scale = Some([values[0], values[1], values.get(2).copied().unwrap_or(0.0)]);
            } else {
                warn!("Ignoring ModelPixelScale with {} value(s)", values.len());
            }
        }

        if ifd.has_tag(tags::MODEL_TIEPOINT_TAG) {
            let values = tiff_reader.read_f64_values(reader, ifd, tags::MODEL_TIEPOINT_TAG)?;
            if values.len() >= 6 {
                if values.len() > 6 {
                    debug!("Using the first of {} tiepoints", values.len() / 6);
                }
                let mut tiepoint = [0.0; 6];
                tiepoint.copy_from_slice(&values[..6]);
                georef.tiepoint = Some(tiepoint);
            } else {
                warn!("Ignoring ModelTiepoint with {} value(s)", values.len());
            }
        }

        if ifd.has_tag(tags::GEO_KEY_DIRECTORY_TAG) {
            let directory: Vec<u16> = tiff_reader
                .read_tag_values(reader, ifd, tags::GEO_KEY_DIRECTORY_TAG)?
                .into_iter()
                .map(|v| v as u16)
                .collect();
            let double_params = if ifd.has_tag(tags::GEO_DOUBLE_PARAMS_TAG) {
                tiff_reader.read_f64_values(reader, ifd, tags::GEO_DOUBLE_PARAMS_TAG)?
            } else {
                Vec::new()
            };
            let ascii_params = if ifd.has_tag(tags::GEO_ASCII_PARAMS_TAG) {
                Some(tiff_reader.read_ascii(reader, ifd, tags::GEO_ASCII_PARAMS_TAG)?)
            } else {
                None
            };

            let block = GeoKeyBlock { directory, double_params, ascii_params };
            debug!("GeoKey directory with {} key(s)", block.key_count());
            georef.geo_keys = Some(block);
        }

        Ok(georef)
    }

    pub fn is_georeferenced(&self) -> bool {
        self.pixel_scale.is_some() && self.tiepoint.is_some()
    }

    /// Transform of the window whose top-left pixel is (`x`, `y`)
    ///
    /// The model position of the window origin is derived from the first
    /// tiepoint and the pixel scale (y grows downwards in raster space and
    /// upwards in model space). Without georeferencing the window is placed
    /// in pixel space with unit scale.
    pub fn window(&self, x: usize, y: usize) -> WindowTransform {
        match (self.pixel_scale, self.tiepoint) {
            (Some(scale), Some(tp)) => {
                let map_x = tp[3] + (x as f64 - tp[0]) * scale[0];
                let map_y = tp[4] - (y as f64 - tp[1]) * scale[1].abs();
                WindowTransform {
                    pixel_scale: scale,
                    tiepoint: [0.0, 0.0, 0.0, map_x, map_y, tp[5]],
                }
            }
            _ => WindowTransform {
                pixel_scale: [1.0, 1.0, 0.0],
                tiepoint: [0.0, 0.0, 0.0, x as f64, y as f64, 0.0],
            },
        }
    }
}
