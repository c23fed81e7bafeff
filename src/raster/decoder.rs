//! Pixel data decoding for TIFF sources
//!
//! Reads every strip or tile of the primary image, undoes compression and
//! the horizontal predictor, and assembles the samples into a
//! `(row, column, band)` grid. Chunks are normalized to little-endian right
//! after decompression so the rest of the pipeline is byte-order agnostic.

use std::io::SeekFrom;

use byteorder::{ByteOrder as _, LittleEndian};
use log::{debug, info};
use ndarray::Array3;

use crate::compression::{CompressionFactory, CompressionHandler};
use crate::io::byte_order::ByteOrder;
use crate::io::seekable::SeekableReader;
use crate::raster::grid::{RasterGrid, SampleType};
use crate::tiff::constants::{self, predictor, sample_format, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::IFD;
use crate::tiff::reader::TiffReader;
use crate::tiff::validation;
use crate::utils::tag_utils;

/// Sample layout of the image described by an IFD
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLayout {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub sample_type: SampleType,
    pub planar: bool,
    pub predictor: u16,
    pub compression: u64,
}

impl ImageLayout {
    fn bytes_per_sample(&self) -> usize {
        self.sample_type.bytes()
    }

    /// Samples per pixel inside one chunk
    fn chunk_samples(&self) -> usize {
        if self.planar { 1 } else { self.bands }
    }
}

/// Geometry of one strip or tile
#[derive(Debug, Clone, Copy)]
struct Chunk {
    /// Index into the offset and byte-count arrays
    index: usize,
    /// Band plane, always 0 for chunky images
    plane: usize,
    x0: usize,
    y0: usize,
    /// Allocated chunk width (tile width, or image width for strips)
    stride: usize,
    /// Rows stored in the chunk
    rows: usize,
}

/// Decodes the primary image of a TIFF file
pub struct RasterDecoder<'a> {
    tiff_reader: &'a TiffReader<'a>,
    ifd: &'a IFD,
}

impl<'a> RasterDecoder<'a> {
    pub fn new(tiff_reader: &'a TiffReader<'a>, ifd: &'a IFD) -> Self {
        RasterDecoder { tiff_reader, ifd }
    }

    /// Reads the sample layout from the IFD
    pub fn layout(&self, reader: &mut dyn SeekableReader) -> TiffResult<ImageLayout> {
        let (width, height) = self.ifd.get_dimensions().ok_or(TiffError::MissingDimensions)?;
        let bands = self.ifd.get_samples_per_pixel() as usize;

        let bits = if self.ifd.has_tag(tags::BITS_PER_SAMPLE) {
            self.tiff_reader.read_tag_values(reader, self.ifd, tags::BITS_PER_SAMPLE)?
        } else {
            vec![1]
        };
        let formats = if self.ifd.has_tag(tags::SAMPLE_FORMAT) {
            self.tiff_reader.read_tag_values(reader, self.ifd, tags::SAMPLE_FORMAT)?
        } else {
            vec![sample_format::UNSIGNED as u64]
        };

        let bit_depth = bits.first().copied().unwrap_or(1) as u16;
        let format = formats.first().copied().unwrap_or(1) as u16;
        if bits.iter().any(|&b| b as u16 != bit_depth) || formats.iter().any(|&f| f as u16 != format) {
            return Err(TiffError::GenericError(format!(
                "Mixed sample layouts are not supported: bits {:?}, formats {:?}", bits, formats)));
        }

        Ok(ImageLayout {
            width: width as usize,
            height: height as usize,
            bands,
            sample_type: SampleType::from_tiff(bit_depth, format)?,
            planar: self.ifd.is_planar() && bands > 1,
            predictor: self.ifd.get_tag_value(tags::PREDICTOR).unwrap_or(predictor::NONE as u64) as u16,
            compression: self.ifd.get_tag_value(tags::COMPRESSION).unwrap_or(1),
        })
    }

    /// Decodes the whole image
    pub fn decode(&self, reader: &mut dyn SeekableReader) -> TiffResult<RasterGrid> {
        let layout = self.layout(reader)?;
        info!("Decoding {}x{} {} image, {} band(s) of {}, {} compression{}",
              layout.width, layout.height,
              tag_utils::get_photometric_name(self.ifd.get_tag_value(tags::PHOTOMETRIC_INTERPRETATION).unwrap_or(1)),
              layout.bands, layout.sample_type,
              tag_utils::get_compression_name(layout.compression),
              if layout.planar { ", planar" } else { "" });

        if layout.predictor != predictor::NONE && layout.predictor != predictor::HORIZONTAL_DIFFERENCING {
            return Err(TiffError::GenericError(format!("Unsupported predictor: {}", layout.predictor)));
        }
        let handler = CompressionFactory::create_handler(layout.compression)?;
        let big_endian = self.tiff_reader.handler()?.order() == ByteOrder::BigEndian;

        let (offsets_tag, counts_tag) = if self.ifd.is_tiled() {
            (tags::TILE_OFFSETS, tags::TILE_BYTE_COUNTS)
        } else {
            (tags::STRIP_OFFSETS, tags::STRIP_BYTE_COUNTS)
        };
        let offsets = self.tiff_reader.read_tag_values(reader, self.ifd, offsets_tag)?;
        let byte_counts = self.tiff_reader.read_tag_values(reader, self.ifd, counts_tag)?;

        let chunks = self.chunks(&layout, offsets.len().min(byte_counts.len()))?;
        debug!("Reading {} chunk(s)", chunks.len());

        let file_size = validation::get_file_size(reader)?;
        for chunk in &chunks {
            validation::validate_chunk_extent(offsets[chunk.index], byte_counts[chunk.index], file_size)?;
        }

        let total = layout.width
            .checked_mul(layout.height)
            .and_then(|n| n.checked_mul(layout.bands))
            .and_then(|n| n.checked_mul(layout.bytes_per_sample()))
            .ok_or_else(|| TiffError::GenericError(format!(
                "Image of {}x{}x{} {} samples is too large",
                layout.width, layout.height, layout.bands, layout.sample_type)))?;
        // Uncompressed pixels are stored verbatim, so they cannot outgrow the file
        if layout.compression == constants::compression::NONE as u64 && total as u64 > file_size {
            return Err(TiffError::TruncatedData { expected: total, actual: file_size as usize });
        }
        let mut samples = Vec::new();
        samples.try_reserve_exact(total).map_err(|e| TiffError::GenericError(format!(
            "Cannot allocate {} bytes for a {}x{} image: {}", total, layout.width, layout.height, e)))?;
        samples.resize(total, 0);

        for chunk in &chunks {
            let data = self.read_chunk(
                reader,
                offsets[chunk.index],
                byte_counts[chunk.index],
                &*handler,
                &layout,
                chunk,
                big_endian
            )?;
            Self::place_chunk(&data, &mut samples, &layout, chunk);
        }

        Self::into_grid(samples, &layout)
    }

    /// Chunk geometry in offset-array order
    ///
    /// `available` is the number of offsets and byte counts the IFD carries;
    /// an image that needs more chunks than that is rejected before any
    /// geometry is built.
    fn chunks(&self, layout: &ImageLayout, available: usize) -> TiffResult<Vec<Chunk>> {
        let planes = if layout.planar { layout.bands } else { 1 };
        let check_count = |per_plane: usize| -> TiffResult<()> {
            match per_plane.checked_mul(planes) {
                Some(needed) if needed <= available => Ok(()),
                needed => Err(TiffError::GenericError(format!(
                    "Image needs {} chunks but only {} offsets and byte counts are present",
                    needed.map_or_else(|| "too many".to_string(), |n| n.to_string()), available))),
            }
        };
        let mut chunks = Vec::new();

        if self.ifd.is_tiled() {
            let tile_width = self.ifd.get_tag_value(tags::TILE_WIDTH).unwrap_or(0) as usize;
            let tile_height = self.ifd.get_tag_value(tags::TILE_LENGTH).unwrap_or(0) as usize;
            if tile_width == 0 || tile_height == 0 {
                return Err(TiffError::GenericError("Tile dimensions must be non-zero".to_string()));
            }

            let across = layout.width.div_ceil(tile_width);
            let down = layout.height.div_ceil(tile_height);
            check_count(across.saturating_mul(down))?;
            for plane in 0..planes {
                for ty in 0..down {
                    for tx in 0..across {
                        chunks.push(Chunk {
                            index: chunks.len(),
                            plane,
                            x0: tx * tile_width,
                            y0: ty * tile_height,
                            stride: tile_width,
                            rows: tile_height,
                        });
                    }
                }
            }
        } else {
            let rows_per_strip = self.ifd.get_tag_value(tags::ROWS_PER_STRIP)
                .map(|r| r as usize)
                .filter(|&r| r > 0)
                .unwrap_or(layout.height)
                .min(layout.height.max(1));

            let strips = layout.height.div_ceil(rows_per_strip);
            check_count(strips)?;
            for plane in 0..planes {
                for strip in 0..strips {
                    let y0 = strip * rows_per_strip;
                    chunks.push(Chunk {
                        index: chunks.len(),
                        plane,
                        x0: 0,
                        y0,
                        stride: layout.width,
                        rows: rows_per_strip.min(layout.height - y0),
                    });
                }
            }
        }

        Ok(chunks)
    }

    /// Reads, decompresses and un-predicts one chunk
    fn read_chunk(
        &self,
        reader: &mut dyn SeekableReader,
        offset: u64,
        byte_count: u64,
        handler: &dyn CompressionHandler,
        layout: &ImageLayout,
        chunk: &Chunk,
        big_endian: bool
    ) -> TiffResult<Vec<u8>> {
        reader.seek(SeekFrom::Start(offset))?;
        let mut compressed = vec![0u8; byte_count as usize];
        reader.read_exact(&mut compressed)?;

        let mut data = handler.decompress(&compressed)?;

        let bps = layout.bytes_per_sample();
        let row_bytes = chunk.stride * layout.chunk_samples() * bps;
        validation::validate_chunk_length(row_bytes * chunk.rows, data.len())?;
        data.truncate(row_bytes * chunk.rows);

        if big_endian && bps > 1 {
            data.chunks_exact_mut(bps).for_each(|sample| sample.reverse());
        }

        if layout.predictor == predictor::HORIZONTAL_DIFFERENCING {
            for row in data.chunks_exact_mut(row_bytes) {
                undo_horizontal_differencing(row, layout.chunk_samples(), bps);
            }
        }

        Ok(data)
    }

    /// Copies the part of a chunk that lies inside the image into `samples`
    fn place_chunk(data: &[u8], samples: &mut [u8], layout: &ImageLayout, chunk: &Chunk) {
        let bps = layout.bytes_per_sample();
        let pixel_bytes = layout.bands * bps;
        let valid_rows = chunk.rows.min(layout.height.saturating_sub(chunk.y0));
        let valid_cols = chunk.stride.min(layout.width.saturating_sub(chunk.x0));

        for r in 0..valid_rows {
            let dst_row = ((chunk.y0 + r) * layout.width + chunk.x0) * pixel_bytes;

            if layout.planar {
                let src_row = r * chunk.stride * bps;
                for c in 0..valid_cols {
                    let src = src_row + c * bps;
                    let dst = dst_row + c * pixel_bytes + chunk.plane * bps;
                    samples[dst..dst + bps].copy_from_slice(&data[src..src + bps]);
                }
            } else {
                let src = r * chunk.stride * pixel_bytes;
                let len = valid_cols * pixel_bytes;
                samples[dst_row..dst_row + len].copy_from_slice(&data[src..src + len]);
            }
        }
    }

    /// Converts little-endian sample bytes into a typed grid
    fn into_grid(samples: Vec<u8>, layout: &ImageLayout) -> TiffResult<RasterGrid> {
        let shape = (layout.height, layout.width, layout.bands);
        let count = layout.height * layout.width * layout.bands;
        let shape_error = |e: ndarray::ShapeError| TiffError::GenericError(format!("Invalid grid shape: {}", e));

        let grid = match layout.sample_type {
            SampleType::U8 => RasterGrid::from(Array3::from_shape_vec(shape, samples).map_err(shape_error)?),
            SampleType::U16 => {
                let mut out = vec![0u16; count];
                LittleEndian::read_u16_into(&samples, &mut out);
                RasterGrid::from(Array3::from_shape_vec(shape, out).map_err(shape_error)?)
            }
            SampleType::I16 => {
                let mut out = vec![0i16; count];
                LittleEndian::read_i16_into(&samples, &mut out);
                RasterGrid::from(Array3::from_shape_vec(shape, out).map_err(shape_error)?)
            }
            SampleType::U32 => {
                let mut out = vec![0u32; count];
                LittleEndian::read_u32_into(&samples, &mut out);
                RasterGrid::from(Array3::from_shape_vec(shape, out).map_err(shape_error)?)
            }
            SampleType::I32 => {
                let mut out = vec![0i32; count];
                LittleEndian::read_i32_into(&samples, &mut out);
                RasterGrid::from(Array3::from_shape_vec(shape, out).map_err(shape_error)?)
            }
            SampleType::F32 => {
                let mut out = vec![0f32; count];
                LittleEndian::read_f32_into(&samples, &mut out);
                RasterGrid::from(Array3::from_shape_vec(shape, out).map_err(shape_error)?)
            }
            SampleType::F64 => {
                let mut out = vec![0f64; count];
                LittleEndian::read_f64_into(&samples, &mut out);
                RasterGrid::from(Array3::from_shape_vec(shape, out).map_err(shape_error)?)
            }
        };

        Ok(grid)
    }
}

/// Reverses TIFF predictor 2 on one little-endian row
///
/// Each sample is stored as the difference to the same band of the previous
/// pixel; accumulation wraps at the sample width.
fn undo_horizontal_differencing(row: &mut [u8], samples_per_pixel: usize, bps: usize) {
    let stride = samples_per_pixel * bps;
    let mut i = stride;
    while i + bps <= row.len() {
        let prev = i - stride;
        match bps {
            1 => row[i] = row[i].wrapping_add(row[prev]),
            2 => {
                let v = LittleEndian::read_u16(&row[i..]).wrapping_add(LittleEndian::read_u16(&row[prev..]));
                LittleEndian::write_u16(&mut row[i..], v);
            }
            4 => {
                let v = LittleEndian::read_u32(&row[i..]).wrapping_add(LittleEndian::read_u32(&row[prev..]));
                LittleEndian::write_u32(&mut row[i..], v);
            }
            _ => {
                let v = LittleEndian::read_u64(&row[i..]).wrapping_add(LittleEndian::read_u64(&row[prev..]));
                LittleEndian::write_u64(&mut row[i..], v);
            }
        }
        i += bps;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{AdobeDeflateHandler, ZstdHandler};
    use crate::raster::grid::GridData;
    use crate::tiff::tests::test_utils::{TiffFixture, Values};
    use crate::utils::logger::Logger;

    fn decode(fixture: &TiffFixture) -> TiffResult<RasterGrid> {
        let logger = Logger::console_only();
        let mut cursor = fixture.cursor();
        let mut reader = TiffReader::new(&logger);
        let tiff = reader.read(&mut cursor)?;
        let ifd = tiff.main_ifd().ok_or(TiffError::MissingDimensions)?;
        RasterDecoder::new(&reader, ifd).decode(&mut cursor)
    }

    fn u16_bytes(values: &[u16], big_endian: bool) -> Vec<u8> {
        let mut out = Vec::new();
        for &v in values {
            crate::tiff::tests::test_utils::write_u16(&mut out, v, big_endian);
        }
        out
    }

    #[test]
    fn test_multi_strip_u8() {
        let fixture = TiffFixture::image(false, 3, 3, &[8])
            .tag(tags::ROWS_PER_STRIP, Values::Longs(vec![2]))
            .strips(vec![vec![1, 2, 3, 4, 5, 6], vec![7, 8, 9]]);
        let grid = decode(&fixture).unwrap();

        assert_eq!(grid.shape(), (3, 3, 1));
        let a = grid.as_u8().unwrap();
        assert_eq!(a[[0, 0, 0]], 1);
        assert_eq!(a[[1, 2, 0]], 6);
        assert_eq!(a[[2, 1, 0]], 8);
    }

    #[test]
    fn test_big_endian_u16_chunky() {
        for big_endian in [false, true] {
            let pixels = [100u16, 200, 300, 400, 500, 600, 700, 800];
            let fixture = TiffFixture::image(big_endian, 2, 2, &[16, 16])
                .strips(vec![u16_bytes(&pixels, big_endian)]);
            let grid = decode(&fixture).unwrap();

            match grid.data() {
                GridData::U16(a) => {
                    assert_eq!(a.dim(), (2, 2, 2));
                    assert_eq!(a[[0, 0, 1]], 200);
                    assert_eq!(a[[1, 1, 0]], 700);
                }
                other => panic!("unexpected variant {:?}", other),
            }
        }
    }

    #[test]
    fn test_planar_strips() {
        let fixture = TiffFixture::image(false, 2, 1, &[8, 8, 8])
            .tag(tags::PLANAR_CONFIGURATION, Values::Shorts(vec![2]))
            .strips(vec![vec![1, 2], vec![10, 20], vec![100, 200]]);
        let a = decode(&fixture).unwrap().as_u8().unwrap().clone();

        assert_eq!(a.dim(), (1, 2, 3));
        assert_eq!(a[[0, 0, 0]], 1);
        assert_eq!(a[[0, 0, 1]], 10);
        assert_eq!(a[[0, 1, 2]], 200);
    }

    #[test]
    fn test_padded_tiles() {
        // 3x3 image in 2x2 tiles; edge tiles carry padding
        let tiles = vec![
            vec![1, 2, 4, 5],
            vec![3, 0, 6, 0],
            vec![7, 8, 0, 0],
            vec![9, 0, 0, 0],
        ];
        let fixture = TiffFixture::image(false, 3, 3, &[8])
            .tag(tags::TILE_WIDTH, Values::Shorts(vec![2]))
            .tag(tags::TILE_LENGTH, Values::Shorts(vec![2]))
            .tiles(tiles);
        let a = decode(&fixture).unwrap().as_u8().unwrap().clone();

        let flat: Vec<u8> = a.iter().copied().collect();
        assert_eq!(flat, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_deflate_with_predictor() {
        // Row 10, 12, 15, 11 differenced: 10, 2, 3, 252
        let raw = vec![10u8, 2, 3, 252];
        let packed = AdobeDeflateHandler::new().compress(&raw).unwrap();
        let fixture = TiffFixture::image(false, 4, 1, &[8])
            .tag(tags::COMPRESSION, Values::Shorts(vec![8]))
            .tag(tags::PREDICTOR, Values::Shorts(vec![2]))
            .strips(vec![packed]);
        let a = decode(&fixture).unwrap().as_u8().unwrap().clone();

        assert_eq!(a.iter().copied().collect::<Vec<_>>(), vec![10, 12, 15, 11]);
    }

    #[test]
    fn test_zstd_float_samples() {
        let values = [0.5f32, -1.25, 3.0, f32::NAN];
        let mut raw = Vec::new();
        for v in values {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let packed = ZstdHandler::new().compress(&raw).unwrap();
        let fixture = TiffFixture::image(false, 2, 2, &[32])
            .tag(tags::SAMPLE_FORMAT, Values::Shorts(vec![3]))
            .tag(tags::COMPRESSION, Values::Shorts(vec![14]))
            .strips(vec![packed]);

        match decode(&fixture).unwrap().data() {
            GridData::F32(a) => {
                assert_eq!(a[[0, 1, 0]], -1.25);
                assert!(a[[1, 1, 0]].is_nan());
            }
            other => panic!("unexpected variant {:?}", other),
        }
    }

    #[test]
    fn test_truncated_strip_is_an_error() {
        let fixture = TiffFixture::image(false, 4, 4, &[8]).strips(vec![vec![0; 10]]);
        assert!(matches!(decode(&fixture), Err(TiffError::TruncatedData { expected: 16, actual: 10 })));
    }

    #[test]
    fn test_byte_count_past_end_of_file() {
        let fixture = TiffFixture::image(false, 4, 1, &[8])
            .strips(vec![vec![1, 2, 3, 4]])
            .byte_counts(vec![u32::MAX]);
        match decode(&fixture) {
            Err(TiffError::GenericError(msg)) => assert!(msg.contains("exceeds file size"), "{}", msg),
            other => panic!("unexpected result {:?}", other.map(|g| g.shape())),
        }
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        let fixture = TiffFixture::image(false, u32::MAX, u32::MAX, &[8]).strips(vec![vec![0; 16]]);
        assert!(decode(&fixture).is_err());

        let fixture = TiffFixture::image(false, u32::MAX, u32::MAX, &[8])
            .tag(tags::TILE_WIDTH, Values::Shorts(vec![16]))
            .tag(tags::TILE_LENGTH, Values::Shorts(vec![16]))
            .tiles(vec![vec![0; 256]]);
        assert!(decode(&fixture).is_err());
    }

    #[test]
    fn test_tag_payload_past_end_of_file() {
        let logger = Logger::console_only();
        let fixture = TiffFixture::image(false, 2, 1, &[8, 8, 8]).strips(vec![vec![0; 6]]);
        let mut bytes = fixture.build();
        // BitsPerSample is the third entry; bump its count from 3 to 2^30
        let count_at = 8 + 2 + 2 * 12 + 4;
        bytes[count_at..count_at + 4].copy_from_slice(&(1u32 << 30).to_le_bytes());
        let mut cursor = std::io::Cursor::new(bytes);
        let mut reader = TiffReader::new(&logger);
        let tiff = reader.read(&mut cursor).unwrap();
        let ifd = tiff.main_ifd().unwrap();
        assert!(reader.read_tag_values(&mut cursor, ifd, tags::BITS_PER_SAMPLE).is_err());
    }

    #[test]
    fn test_unsupported_layouts() {
        let fixture = TiffFixture::image(false, 1, 1, &[12]).strips(vec![vec![0, 0]]);
        assert!(matches!(decode(&fixture), Err(TiffError::UnsupportedSampleLayout { bits: 12, .. })));

        let fixture = TiffFixture::image(false, 1, 1, &[8])
            .tag(tags::COMPRESSION, Values::Shorts(vec![5]))
            .strips(vec![vec![0]]);
        assert!(matches!(decode(&fixture), Err(TiffError::UnsupportedCompression(5))));
    }
}
