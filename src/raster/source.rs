//! Opening source rasters
//!
//! TIFF and BigTIFF files go through the crate's own reader so every sample
//! type and the GeoTIFF tags survive. Anything else is handed to the `image`
//! crate, which covers the common interchange formats.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use log::{debug, info, warn};
use ndarray::{Array3, ShapeError};

use crate::pipeline::errors::{PipelineError, PipelineResult};
use crate::raster::decoder::RasterDecoder;
use crate::raster::georef::GeoReference;
use crate::raster::grid::RasterGrid;
use crate::tiff::errors::TiffError;
use crate::tiff::reader::TiffReader;
use crate::utils::logger::Logger;

/// Container a source was decoded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFormat {
    Tiff,
    BigTiff,
    /// Decoded by the `image` crate, with the detected format name
    Other(String),
}

/// A decoded source raster
#[derive(Debug, Clone)]
pub struct RasterSource {
    pub path: PathBuf,
    pub grid: RasterGrid,
    /// GeoTIFF georeferencing, when present
    pub georef: Option<GeoReference>,
    pub format: SourceFormat,
}

impl RasterSource {
    /// Opens and fully decodes the raster at `path`
    pub fn open(path: &Path, logger: &Logger) -> PipelineResult<RasterSource> {
        if !path.is_file() {
            return Err(PipelineError::source_unreadable(path, "file not found"));
        }

        let source = if is_tiff(path)? {
            Self::open_tiff(path, logger)?
        } else {
            Self::open_image(path)?
        };

        if source.grid.is_empty() {
            return Err(PipelineError::source_unreadable(
                path, format!("raster has no samples ({})", source.grid)));
        }

        info!("Opened {} as {}", path.display(), source.grid);
        if let Err(e) = logger.log(&format!("Opened source {} ({:?}, {})", path.display(), source.format, source.grid)) {
            warn!("Could not journal source {}: {}", path.display(), e);
        }
        Ok(source)
    }

    fn open_tiff(path: &Path, logger: &Logger) -> PipelineResult<RasterSource> {
        let unreadable = |e: TiffError| PipelineError::source_unreadable(path, e);

        let mut tiff_reader = TiffReader::new(logger);
        let tiff = tiff_reader.load(path).map_err(unreadable)?;
        let ifd = tiff.main_ifd()
            .ok_or_else(|| PipelineError::source_unreadable(path, "no image directory"))?;
        let mut reader = tiff_reader.create_reader().map_err(unreadable)?;

        let grid = RasterDecoder::new(&tiff_reader, ifd).decode(&mut reader).map_err(unreadable)?;

        // A broken GeoTIFF tag only costs the georeferencing, not the pixels
        let georef = match GeoReference::read(&tiff_reader, &mut reader, ifd) {
            Ok(georef) if georef == GeoReference::default() => None,
            Ok(georef) => Some(georef),
            Err(e) => {
                warn!("Ignoring georeferencing of {}: {}", path.display(), e);
                None
            }
        };

        Ok(RasterSource {
            path: path.to_path_buf(),
            grid,
            georef,
            format: if tiff.is_big_tiff { SourceFormat::BigTiff } else { SourceFormat::Tiff },
        })
    }

    fn open_image(path: &Path) -> PipelineResult<RasterSource> {
        let image_reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| PipelineError::source_unreadable(path, e))?;
        let format = image_reader.format()
            .ok_or_else(|| PipelineError::source_unreadable(path, "unrecognized raster format"))?;
        debug!("Decoding {} as {:?}", path.display(), format);

        let image = image_reader.decode().map_err(|e| PipelineError::source_unreadable(path, e))?;
        let grid = grid_from_image(image).map_err(|e| PipelineError::source_unreadable(path, e))?;

        Ok(RasterSource {
            path: path.to_path_buf(),
            grid,
            georef: None,
            format: SourceFormat::Other(format!("{:?}", format)),
        })
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn bands(&self) -> usize {
        self.grid.bands()
    }
}

/// Checks the four magic bytes of classic and BigTIFF files in either order
fn is_tiff(path: &Path) -> PipelineResult<bool> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path).map_err(|e| PipelineError::source_unreadable(path, e))?;
    let read = file.read(&mut magic).map_err(|e| PipelineError::source_unreadable(path, e))?;

    Ok(read == 4 && matches!(&magic, b"II*\0" | b"MM\0*" | b"II+\0" | b"MM\0+"))
}

fn to_array<T>(width: u32, height: u32, bands: usize, raw: Vec<T>) -> Result<Array3<T>, ShapeError> {
    Array3::from_shape_vec((height as usize, width as usize, bands), raw)
}

/// Keeps the bit depth of 8-bit, 16-bit and float images; other layouts are
/// expanded to RGBA8
fn grid_from_image(image: DynamicImage) -> Result<RasterGrid, ShapeError> {
    let (w, h) = (image.width(), image.height());
    let grid: RasterGrid = match image {
        DynamicImage::ImageLuma8(img) => to_array(w, h, 1, img.into_raw())?.into(),
        DynamicImage::ImageLumaA8(img) => to_array(w, h, 2, img.into_raw())?.into(),
        DynamicImage::ImageRgb8(img) => to_array(w, h, 3, img.into_raw())?.into(),
        DynamicImage::ImageRgba8(img) => to_array(w, h, 4, img.into_raw())?.into(),
        DynamicImage::ImageLuma16(img) => to_array(w, h, 1, img.into_raw())?.into(),
        DynamicImage::ImageLumaA16(img) => to_array(w, h, 2, img.into_raw())?.into(),
        DynamicImage::ImageRgb16(img) => to_array(w, h, 3, img.into_raw())?.into(),
        DynamicImage::ImageRgba16(img) => to_array(w, h, 4, img.into_raw())?.into(),
        DynamicImage::ImageRgb32F(img) => to_array(w, h, 3, img.into_raw())?.into(),
        DynamicImage::ImageRgba32F(img) => to_array(w, h, 4, img.into_raw())?.into(),
        other => to_array(w, h, 4, other.to_rgba8().into_raw())?.into(),
    };
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::grid::{GridData, SampleType};
    use crate::tiff::constants::tags;
    use crate::tiff::tests::test_utils::{TiffFixture, Values};
    use tempfile::tempdir;

    #[test]
    fn test_open_geotiff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pan.tif");
        TiffFixture::image(true, 2, 2, &[16])
            .tag(tags::MODEL_PIXEL_SCALE_TAG, Values::Doubles(vec![0.5, 0.5, 0.0]))
            .tag(tags::MODEL_TIEPOINT_TAG, Values::Doubles(vec![0.0, 0.0, 0.0, 10.0, 20.0, 0.0]))
            .strips(vec![vec![0, 1, 0, 2, 0, 3, 1, 0]])
            .write_to(&path);

        let source = RasterSource::open(&path, &Logger::console_only()).unwrap();
        assert_eq!(source.format, SourceFormat::Tiff);
        assert_eq!(source.grid.shape(), (2, 2, 1));
        assert_eq!(source.grid.sample_type(), SampleType::U16);
        match source.grid.data() {
            GridData::U16(a) => assert_eq!(a[[1, 1, 0]], 256),
            other => panic!("unexpected variant {:?}", other),
        }
        assert!(source.georef.unwrap().is_georeferenced());
    }

    #[test]
    fn test_open_png_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ms.png");
        let img = image::RgbImage::from_fn(4, 3, |x, y| image::Rgb([x as u8, y as u8, 7]));
        img.save(&path).unwrap();

        let source = RasterSource::open(&path, &Logger::console_only()).unwrap();
        assert_eq!(source.format, SourceFormat::Other("Png".to_string()));
        assert_eq!((source.height(), source.width(), source.bands()), (3, 4, 3));
        let a = source.grid.as_u8().unwrap();
        assert_eq!(a[[2, 3, 0]], 3);
        assert_eq!(a[[2, 3, 1]], 2);
        assert_eq!(a[[0, 0, 2]], 7);
        assert!(source.georef.is_none());
    }

    #[test]
    fn test_unreadable_sources() {
        let dir = tempdir().unwrap();
        let logger = Logger::console_only();

        let missing = dir.path().join("missing.tif");
        assert!(matches!(
            RasterSource::open(&missing, &logger),
            Err(PipelineError::SourceUnreadable { .. })
        ));

        let garbage = dir.path().join("notes.txt");
        std::fs::write(&garbage, b"this is not a raster").unwrap();
        assert!(matches!(
            RasterSource::open(&garbage, &logger),
            Err(PipelineError::SourceUnreadable { .. })
        ));

        // Valid header, pixel data cut short
        let truncated = dir.path().join("truncated.tif");
        TiffFixture::image(false, 8, 8, &[8]).strips(vec![vec![0; 10]]).write_to(&truncated);
        match RasterSource::open(&truncated, &logger) {
            Err(PipelineError::SourceUnreadable { path, reason }) => {
                assert_eq!(path, truncated);
                assert!(reason.contains("Truncated"), "{}", reason);
            }
            other => panic!("expected SourceUnreadable, got {:?}", other.map(|s| s.grid)),
        }
    }
}
