//! GeoTIFF tags
//!
//! Model tiepoint, pixel scale and the GeoKey directory with its parameter
//! tags. These place an exported tile on the map.

use log::{debug, info};

use crate::tiff::constants::{epsg, geo_keys, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::IFD;
use crate::utils::tiff_utils::{self, ExternalData};

/// Writes GeoTIFF tags
pub struct GeoTagsBuilder;

impl GeoTagsBuilder {
    /// Sets ModelPixelScale and a single ModelTiepoint
    ///
    /// `tiepoint` is (raster x, raster y, raster z, map x, map y, map z).
    pub fn set_model_transform(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        pixel_scale: &[f64],
        tiepoint: &[f64],
        is_big_tiff: bool
    ) -> TiffResult<()> {
        if pixel_scale.len() < 2 || tiepoint.len() < 6 {
            return Err(TiffError::GenericError(
                "Invalid pixel scale or tiepoint data".to_string()));
        }
        debug!("Tiepoint {:?}, pixel scale {:?}", &tiepoint[..6], pixel_scale);

        let scale = [pixel_scale[0], pixel_scale[1], pixel_scale.get(2).copied().unwrap_or(0.0)];
        tiff_utils::set_double_values(ifd, external_data, ifd_index,
                                      tags::MODEL_PIXEL_SCALE_TAG, &scale, is_big_tiff);
        tiff_utils::set_double_values(ifd, external_data, ifd_index,
                                      tags::MODEL_TIEPOINT_TAG, &tiepoint[..6], is_big_tiff);
        Ok(())
    }

    /// Copies a GeoKey directory and its parameter tags verbatim
    pub fn set_geo_keys(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        directory: &[u16],
        double_params: &[f64],
        ascii_params: Option<&str>,
        is_big_tiff: bool
    ) -> TiffResult<()> {
        if directory.len() < 4 || directory.len() != 4 * (directory[3] as usize + 1) {
            return Err(TiffError::GenericError(format!(
                "Malformed GeoKey directory of {} values", directory.len())));
        }
        info!("Writing GeoKey directory with {} key(s)", directory[3]);

        tiff_utils::set_short_values(ifd, external_data, ifd_index,
                                     tags::GEO_KEY_DIRECTORY_TAG, directory, is_big_tiff);
        if !double_params.is_empty() {
            tiff_utils::set_double_values(ifd, external_data, ifd_index,
                                          tags::GEO_DOUBLE_PARAMS_TAG, double_params, is_big_tiff);
        }
        if let Some(ascii) = ascii_params.filter(|s| !s.is_empty()) {
            tiff_utils::set_ascii_value(ifd, external_data, ifd_index,
                                        tags::GEO_ASCII_PARAMS_TAG, ascii, is_big_tiff);
        }
        Ok(())
    }

    /// GeoKey directory declaring geographic WGS84 (EPSG:4326) in degrees
    pub fn wgs84_directory() -> Vec<u16> {
        vec![
            1, 1, 0, 4,
            geo_keys::GT_MODEL_TYPE, 0, 1, geo_keys::MODEL_TYPE_GEOGRAPHIC,
            geo_keys::GT_RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA,
            geo_keys::GEOGRAPHIC_TYPE, 0, 1, epsg::WGS84,
            geo_keys::GEOG_ANGULAR_UNITS, 0, 1, geo_keys::ANGULAR_DEGREE,
        ]
    }
}
