//! Tests for TiffBuilder output, read back through TiffReader

extern crate std;

use std::io::Cursor;

use crate::tiff::builder::TiffBuilder;
use crate::tiff::builders::metadata_tags::{MetadataBuilder, MetadataItem};
use crate::tiff::constants::{compression, photometric, tags};
use crate::tiff::reader::TiffReader;
use crate::utils::logger::Logger;

fn build(bands: u16, width: u32, height: u32) -> Vec<u8> {
    let logger = Logger::console_only();
    let mut builder = TiffBuilder::new(&logger, false);
    let ifd = builder.add_ifd();
    builder.add_raster_tags(ifd, width, height, bands, 8).unwrap();
    builder.set_compression(ifd, compression::NONE).unwrap();
    let pixels: Vec<u8> = (0..(width * height * bands as u32)).map(|v| v as u8).collect();
    builder.setup_single_strip(ifd, pixels).unwrap();
    builder.set_model_transform(ifd, &[0.5, 0.5, 0.0], &[0.0, 0.0, 0.0, 10.0, 20.0, 0.0]).unwrap();
    builder.set_wgs84_geo_keys(ifd).unwrap();
    builder.set_gdal_metadata(ifd, &[MetadataItem::band("SOURCE_MIN", 0, "3")]).unwrap();

    let mut cursor = Cursor::new(Vec::new());
    builder.write_to(&mut cursor).unwrap();
    cursor.into_inner()
}

#[test]
fn test_rgb_tile_layout() {
    let logger = Logger::console_only();
    let bytes = build(3, 4, 2);
    let mut cursor = Cursor::new(bytes.clone());
    let mut reader = TiffReader::new(&logger);
    let tiff = reader.read(&mut cursor).unwrap();

    std::assert_eq!(tiff.ifd_count(), 1);
    let ifd = tiff.main_ifd().unwrap();
    std::assert_eq!(ifd.get_dimensions(), Some((4, 2)));
    std::assert_eq!(ifd.get_samples_per_pixel(), 3);
    std::assert_eq!(ifd.get_tag_value(tags::PHOTOMETRIC_INTERPRETATION), Some(photometric::RGB as u64));
    std::assert!(!ifd.has_tag(tags::EXTRA_SAMPLES));
    std::assert_eq!(reader.read_tag_values(&mut cursor, ifd, tags::BITS_PER_SAMPLE).unwrap(), vec![8, 8, 8]);

    let offset = reader.read_tag_values(&mut cursor, ifd, tags::STRIP_OFFSETS).unwrap()[0] as usize;
    let count = reader.read_tag_values(&mut cursor, ifd, tags::STRIP_BYTE_COUNTS).unwrap()[0] as usize;
    std::assert_eq!(count, 24);
    std::assert_eq!(offset % 4, 0);
    let expected: Vec<u8> = (0..24u8).collect();
    std::assert_eq!(&bytes[offset..offset + count], expected.as_slice());
}

#[test]
fn test_multiband_tile_declares_extra_samples() {
    let logger = Logger::console_only();
    let mut cursor = Cursor::new(build(4, 2, 2));
    let mut reader = TiffReader::new(&logger);
    let tiff = reader.read(&mut cursor).unwrap();
    let ifd = tiff.main_ifd().unwrap();

    std::assert_eq!(ifd.get_tag_value(tags::PHOTOMETRIC_INTERPRETATION), Some(photometric::BLACK_IS_ZERO as u64));
    std::assert_eq!(reader.read_tag_values(&mut cursor, ifd, tags::EXTRA_SAMPLES).unwrap(), vec![0, 0, 0]);
    std::assert_eq!(reader.read_tag_values(&mut cursor, ifd, tags::SAMPLE_FORMAT).unwrap(), vec![1, 1, 1, 1]);
}

#[test]
fn test_single_band_has_no_extra_samples() {
    let logger = Logger::console_only();
    let mut cursor = Cursor::new(build(1, 3, 3));
    let mut reader = TiffReader::new(&logger);
    let tiff = reader.read(&mut cursor).unwrap();
    let ifd = tiff.main_ifd().unwrap();

    std::assert!(!ifd.has_tag(tags::EXTRA_SAMPLES));
    std::assert_eq!(ifd.get_tag_value(tags::BITS_PER_SAMPLE), Some(8));
    std::assert_eq!(ifd.get_tag_value(tags::ROWS_PER_STRIP), Some(3));
}

#[test]
fn test_geotiff_and_metadata_tags() {
    let logger = Logger::console_only();
    let mut cursor = Cursor::new(build(1, 2, 2));
    let mut reader = TiffReader::new(&logger);
    let tiff = reader.read(&mut cursor).unwrap();
    let ifd = tiff.main_ifd().unwrap();

    let tiepoint = reader.read_f64_values(&mut cursor, ifd, tags::MODEL_TIEPOINT_TAG).unwrap();
    std::assert_eq!(tiepoint, vec![0.0, 0.0, 0.0, 10.0, 20.0, 0.0]);

    let keys = reader.read_tag_values(&mut cursor, ifd, tags::GEO_KEY_DIRECTORY_TAG).unwrap();
    std::assert_eq!(keys[..4], [1, 1, 0, 4]);
    std::assert!(keys.chunks(4).any(|k| k[0] == 2048 && k[3] == 4326));

    let xml = reader.read_ascii(&mut cursor, ifd, tags::GDAL_METADATA).unwrap();
    let items = MetadataBuilder::parse_xml(&xml).unwrap();
    std::assert_eq!(items, vec![MetadataItem::band("SOURCE_MIN", 0, "3")]);
}

#[test]
fn test_invalid_ifd_index_is_an_error() {
    let logger = Logger::console_only();
    let mut builder = TiffBuilder::new(&logger, false);
    std::assert!(builder.set_compression(0, compression::NONE).is_err());
    let ifd = builder.add_ifd();
    std::assert!(builder.add_raster_tags(ifd, 1, 1, 0, 8).is_err());
}
