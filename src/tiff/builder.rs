//! TIFF file construction
//!
//! `TiffBuilder` collects IFDs, external tag payloads and pixel data, then
//! hands them to the writer. The tag builders in `builders/` do the actual
//! encoding; this type checks IFD indices and journals what it writes.

use std::collections::BTreeMap;
use std::io::{Seek, Write};
use std::path::Path;

use log::{debug, info};

use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::IFD;
use crate::utils::logger::Logger;
use crate::utils::tiff_utils::{self, ExternalData};

use crate::tiff::builders::basic_tags::BasicTagsBuilder;
use crate::tiff::builders::geo_tags::GeoTagsBuilder;
use crate::tiff::builders::metadata_tags::{MetadataBuilder, MetadataItem};
use crate::tiff::builders::writer::WriterBuilder;

/// Builder for TIFF files
pub struct TiffBuilder<'a> {
    logger: &'a Logger,
    is_big_tiff: bool,
    pub ifds: Vec<IFD>,
    image_data: BTreeMap<usize, Vec<u8>>,
    external_data: ExternalData,
}

impl<'a> TiffBuilder<'a> {
    pub fn new(logger: &'a Logger, is_big_tiff: bool) -> Self {
        debug!("Creating new TiffBuilder (is_big_tiff: {})", is_big_tiff);
        TiffBuilder {
            logger,
            is_big_tiff,
            ifds: Vec::new(),
            image_data: BTreeMap::new(),
            external_data: ExternalData::new(),
        }
    }

    /// Appends an empty IFD and returns its index
    pub fn add_ifd(&mut self) -> usize {
        let ifd_index = self.ifds.len();
        self.ifds.push(IFD::new(ifd_index, 0));
        ifd_index
    }

    fn invalid_index(&self, ifd_index: usize) -> TiffError {
        TiffError::GenericError(format!(
            "Invalid IFD index {}, only have {} IFDs", ifd_index, self.ifds.len()))
    }

    /// The IFD at `ifd_index` together with the external payload table
    fn parts(&mut self, ifd_index: usize) -> TiffResult<(&mut IFD, &mut ExternalData)> {
        if ifd_index >= self.ifds.len() {
            return Err(self.invalid_index(ifd_index));
        }
        Ok((&mut self.ifds[ifd_index], &mut self.external_data))
    }

    /// Structure tags of an unsigned chunky raster
    pub fn add_raster_tags(&mut self, ifd_index: usize, width: u32, height: u32, bands: u16, bits_per_sample: u16) -> TiffResult<()> {
        if bands == 0 {
            return Err(TiffError::GenericError("A raster needs at least one band".to_string()));
        }
        let is_big_tiff = self.is_big_tiff;
        let (ifd, external_data) = self.parts(ifd_index)?;
        BasicTagsBuilder::add_raster_tags(
            ifd,
            external_data,
            ifd_index,
            width,
            height,
            bands,
            bits_per_sample,
            is_big_tiff
        );
        Ok(())
    }

    pub fn set_compression(&mut self, ifd_index: usize, code: u16) -> TiffResult<()> {
        let (ifd, _) = self.parts(ifd_index)?;
        BasicTagsBuilder::set_compression(ifd, code);
        Ok(())
    }

    /// Stores the (already compressed) pixel data as one strip
    pub fn setup_single_strip(&mut self, ifd_index: usize, strip_data: Vec<u8>) -> TiffResult<()> {
        if ifd_index >= self.ifds.len() {
            return Err(self.invalid_index(ifd_index));
        }
        BasicTagsBuilder::setup_single_strip(&mut self.ifds[ifd_index], &mut self.image_data, ifd_index, strip_data);
        Ok(())
    }

    pub fn set_ascii_tag(&mut self, ifd_index: usize, tag: u16, value: &str) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        let (ifd, external_data) = self.parts(ifd_index)?;
        tiff_utils::set_ascii_value(ifd, external_data, ifd_index, tag, value, is_big_tiff);
        Ok(())
    }

    /// ModelPixelScale and ModelTiepoint
    pub fn set_model_transform(&mut self, ifd_index: usize, pixel_scale: &[f64], tiepoint: &[f64]) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        let (ifd, external_data) = self.parts(ifd_index)?;
        GeoTagsBuilder::set_model_transform(ifd, external_data, ifd_index, pixel_scale, tiepoint, is_big_tiff)
    }

    /// GeoKey directory with its parameter tags
    pub fn set_geo_keys(&mut self, ifd_index: usize, directory: &[u16], double_params: &[f64], ascii_params: Option<&str>) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        let (ifd, external_data) = self.parts(ifd_index)?;
        GeoTagsBuilder::set_geo_keys(
            ifd,
            external_data,
            ifd_index,
            directory,
            double_params,
            ascii_params,
            is_big_tiff
        )
    }

    /// Geographic WGS84 GeoKey directory
    pub fn set_wgs84_geo_keys(&mut self, ifd_index: usize) -> TiffResult<()> {
        self.set_geo_keys(ifd_index, &GeoTagsBuilder::wgs84_directory(), &[], None)
    }

    pub fn set_gdal_metadata(&mut self, ifd_index: usize, items: &[MetadataItem]) -> TiffResult<()> {
        let is_big_tiff = self.is_big_tiff;
        let (ifd, external_data) = self.parts(ifd_index)?;
        MetadataBuilder::set_gdal_metadata(ifd, external_data, ifd_index, items, is_big_tiff)
    }

    /// Writes the file, replacing an existing one
    pub fn write(&self, output_path: &Path) -> TiffResult<()> {
        info!("Writing TIFF to {}", output_path.display());
        self.logger.log(&format!("Writing TIFF to {}", output_path.display()))?;

        WriterBuilder::write(
            self.is_big_tiff,
            &self.ifds,
            &self.image_data,
            &self.external_data,
            output_path
        )
    }

    /// Writes the file into an in-memory or otherwise seekable sink
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> TiffResult<()> {
        WriterBuilder::write_to(writer, self.is_big_tiff, &self.ifds, &self.image_data, &self.external_data)
    }
}
