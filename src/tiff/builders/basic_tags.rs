//! Image structure tags
//!
//! Dimensions, sample layout and strip geometry of an 8-bit chunky raster.

use log::{debug, info};

use crate::tiff::constants::{extra_samples, field_types, photometric, planar_config, sample_format, tags};
use crate::tiff::ifd::{IFDEntry, IFD};
use crate::utils::tiff_utils::{self, ExternalData};

/// Adds image structure tags to an IFD
pub struct BasicTagsBuilder;

impl BasicTagsBuilder {
    /// Adds the structure tags of an unsigned raster with `bands` samples per pixel
    ///
    /// Three-band rasters are declared RGB; every other band count is
    /// declared BlackIsZero with the bands beyond the first listed as
    /// unspecified extra samples.
    pub fn add_raster_tags(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        width: u32,
        height: u32,
        bands: u16,
        bits_per_sample: u16,
        is_big_tiff: bool
    ) {
        info!("Adding raster tags for {}x{} image, {} band(s) of {} bits", width, height, bands, bits_per_sample);

        ifd.add_entry(IFDEntry::new(tags::NEW_SUBFILE_TYPE, field_types::LONG, 1, 0));
        ifd.add_entry(IFDEntry::new(tags::IMAGE_WIDTH, field_types::LONG, 1, width as u64));
        ifd.add_entry(IFDEntry::new(tags::IMAGE_LENGTH, field_types::LONG, 1, height as u64));

        let per_band = vec![bits_per_sample; bands as usize];
        tiff_utils::set_short_values(ifd, external_data, ifd_index, tags::BITS_PER_SAMPLE, &per_band, is_big_tiff);

        let (photometric, color_channels) = if bands == 3 {
            (photometric::RGB, 3)
        } else {
            (photometric::BLACK_IS_ZERO, 1)
        };
        ifd.add_entry(IFDEntry::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            field_types::SHORT,
            1,
            photometric as u64)
        );
        ifd.add_entry(IFDEntry::new(tags::SAMPLES_PER_PIXEL, field_types::SHORT, 1, bands as u64));
        ifd.add_entry(IFDEntry::new(
            tags::PLANAR_CONFIGURATION,
            field_types::SHORT,
            1,
            planar_config::CHUNKY as u64)
        );

        let formats = vec![sample_format::UNSIGNED; bands as usize];
        tiff_utils::set_short_values(ifd, external_data, ifd_index, tags::SAMPLE_FORMAT, &formats, is_big_tiff);

        if bands > color_channels {
            let extra = vec![extra_samples::UNSPECIFIED; (bands - color_channels) as usize];
            debug!("Declaring {} extra sample(s)", extra.len());
            tiff_utils::set_short_values(ifd, external_data, ifd_index, tags::EXTRA_SAMPLES, &extra, is_big_tiff);
        }
    }

    /// Sets the Compression tag
    pub fn set_compression(ifd: &mut IFD, code: u16) {
        ifd.add_entry(IFDEntry::new(tags::COMPRESSION, field_types::SHORT, 1, code as u64));
    }

    /// Declares the whole image as one strip
    ///
    /// StripOffsets is a placeholder here; the writer fills in the real
    /// position of the pixel data.
    pub fn setup_single_strip(
        ifd: &mut IFD,
        image_data: &mut std::collections::BTreeMap<usize, Vec<u8>>,
        ifd_index: usize,
        strip_data: Vec<u8>
    ) {
        debug!("Setting up single strip: {} bytes", strip_data.len());

        ifd.add_entry(IFDEntry::new(tags::STRIP_OFFSETS, field_types::LONG, 1, 0));
        ifd.add_entry(IFDEntry::new(
            tags::STRIP_BYTE_COUNTS,
            field_types::LONG,
            1,
            strip_data.len() as u64)
        );

        if let Some((_, height)) = ifd.get_dimensions() {
            ifd.add_entry(IFDEntry::new(tags::ROWS_PER_STRIP, field_types::LONG, 1, height));
        }

        image_data.insert(ifd_index, strip_data);
    }
}
