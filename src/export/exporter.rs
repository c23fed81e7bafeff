//! Writing normalized tiles as GeoTIFF files

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use ndarray::Array3;

use crate::compression::CompressionKind;
use crate::pipeline::config::CrsMode;
use crate::pipeline::errors::{PipelineError, PipelineResult};
use crate::raster::georef::GeoReference;
use crate::raster::grid::RasterGrid;
use crate::tiff::builder::TiffBuilder;
use crate::tiff::builders::metadata_tags::MetadataItem;
use crate::tiff::constants::tags;
use crate::tiff::errors::TiffResult;
use crate::tiling::extract::Role;
use crate::tiling::indexer::TileBox;
use crate::tiling::normalize::BandRange;
use crate::utils::logger::Logger;

const SOFTWARE: &str = concat!("pantile ", env!("CARGO_PKG_VERSION"));

/// Where a tile came from; recorded in the file's GDAL metadata
#[derive(Debug, Clone)]
pub struct TileInfo<'t> {
    pub role: Role,
    pub identifier: &'t str,
    pub tile: TileBox,
    /// Source range of each band before normalization
    pub ranges: &'t [BandRange],
}

/// `<root>/<ROLE>_<stem>/<ROLE>_<identifier>.tif`
pub fn tile_path(root: &Path, stem: &str, role: Role, identifier: &str) -> PathBuf {
    root.join(format!("{}_{}", role.prefix(), stem))
        .join(format!("{}_{}.tif", role.prefix(), identifier))
}

/// Writes 8-bit tiles with their georeferencing
pub struct TileExporter<'a> {
    logger: &'a Logger,
    compression: CompressionKind,
    crs: CrsMode,
    /// Georeferencing of the grid the tiles are cut from
    georef: GeoReference,
}

impl<'a> TileExporter<'a> {
    pub fn new(logger: &'a Logger, compression: CompressionKind, crs: CrsMode, georef: Option<GeoReference>) -> Self {
        let mut georef = georef.unwrap_or_default();
        if let Some(keys) = georef.geo_keys.as_ref().filter(|keys| !keys.is_well_formed()) {
            warn!("Ignoring malformed source GeoKey directory of {} values", keys.directory.len());
            georef.geo_keys = None;
        }
        if crs == CrsMode::Source && georef.geo_keys.is_none() {
            warn!("Source has no GeoKey directory, tiles are tagged as WGS84");
        }
        TileExporter { logger, compression, crs, georef }
    }

    /// Writes `grid` to `path`, creating parent directories and replacing an
    /// existing file
    ///
    /// Only filesystem failures are reported as `DestinationWrite`; a tile
    /// that cannot be encoded is a `Tiff` error.
    pub fn export(&self, grid: &RasterGrid, info: &TileInfo, path: &Path) -> PipelineResult<()> {
        let samples = grid.as_u8().ok_or_else(|| PipelineError::InvalidState {
            expected: "8-bit tile".to_string(),
            actual: format!("{} tile", grid.sample_type()),
        })?;
        let write_error = |reason: String| PipelineError::destination_write(path, reason);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }

        let builder = self.build(samples, info)?;
        builder.write(path).map_err(|e| write_error(e.to_string()))
    }

    /// Single-strip TIFF of one tile with its GeoTIFF and GDAL metadata tags
    fn build(&self, samples: &Array3<u8>, info: &TileInfo) -> TiffResult<TiffBuilder<'a>> {
        let (height, width, bands) = samples.dim();
        let handler = self.compression.handler();
        let raw: Vec<u8> = samples.iter().copied().collect();
        let strip = handler.compress(&raw)?;
        debug!("{} tile {} {}: {} bytes, {} after {}",
               info.role, info.identifier, info.tile, raw.len(), strip.len(), handler.name());

        let mut builder = TiffBuilder::new(self.logger, false);
        let ifd = builder.add_ifd();
        builder.add_raster_tags(ifd, width as u32, height as u32, bands as u16, 8)?;
        builder.set_compression(ifd, handler.code())?;
        builder.setup_single_strip(ifd, strip)?;

        let window = self.georef.window(info.tile.x0, info.tile.y0);
        builder.set_model_transform(ifd, &window.pixel_scale, &window.tiepoint)?;
        match (&self.crs, &self.georef.geo_keys) {
            (CrsMode::Source, Some(keys)) => builder.set_geo_keys(
                ifd,
                &keys.directory,
                &keys.double_params,
                keys.ascii_params.as_deref()
            )?,
            _ => builder.set_wgs84_geo_keys(ifd)?,
        }

        builder.set_gdal_metadata(ifd, &Self::metadata(info))?;
        builder.set_ascii_tag(ifd, tags::SOFTWARE, SOFTWARE)?;
        Ok(builder)
    }

    fn metadata(info: &TileInfo) -> Vec<MetadataItem> {
        let mut items = vec![
            MetadataItem::dataset("ROLE", info.role.prefix()),
            MetadataItem::dataset("TILE_ID", info.identifier),
            MetadataItem::dataset("TILE_WINDOW", info.tile.to_string()),
        ];
        for (band, range) in info.ranges.iter().enumerate() {
            items.push(MetadataItem::band("SOURCE_MIN", band, range.min.to_string()));
            items.push(MetadataItem::band("SOURCE_MAX", band, range.max.to_string()));
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::decoder::RasterDecoder;
    use crate::raster::georef::GeoKeyBlock;
    use crate::tiff::builders::metadata_tags::MetadataBuilder;
    use crate::tiff::reader::TiffReader;
    use tempfile::tempdir;

    fn sample_tile(bands: usize) -> RasterGrid {
        Array3::from_shape_fn((4, 6, bands), |(y, x, b)| (y * 60 + x * 10 + b) as u8).into()
    }

    fn info<'t>(role: Role, ranges: &'t [BandRange]) -> TileInfo<'t> {
        TileInfo { role, identifier: "0b1c2d3e-0000-4000-8000-000000000000", tile: TileBox::new(6, 4, 12, 8), ranges }
    }

    #[test]
    fn test_tile_path_layout() {
        let path = tile_path(Path::new("/out"), "scene_ms", Role::Pansharpened, "abc");
        assert_eq!(path, PathBuf::from("/out/PAN_scene_ms/PAN_abc.tif"));
    }

    #[test]
    fn test_exported_tile_reads_back() {
        let dir = tempdir().unwrap();
        let logger = Logger::console_only();
        let georef = GeoReference {
            pixel_scale: Some([0.5, 0.5, 0.0]),
            tiepoint: Some([0.0, 0.0, 0.0, 100.0, 200.0, 0.0]),
            geo_keys: None,
        };
        let ranges = [BandRange { min: 3.0, max: 900.0 }, BandRange { min: 0.0, max: 1.5 }, BandRange { min: 7.0, max: 7.0 }];
        let path = tile_path(dir.path(), "ms", Role::Multispectral, "id");

        for compression in [CompressionKind::None, CompressionKind::Deflate, CompressionKind::Zstd] {
            let exporter = TileExporter::new(&logger, compression, CrsMode::Wgs84, Some(georef.clone()));
            let grid = sample_tile(3);
            exporter.export(&grid, &info(Role::Multispectral, &ranges), &path).unwrap();

            let mut reader = TiffReader::new(&logger);
            let tiff = reader.load(&path).unwrap();
            let ifd = tiff.main_ifd().unwrap();
            let mut file = reader.create_reader().unwrap();

            let decoded = RasterDecoder::new(&reader, ifd).decode(&mut file).unwrap();
            assert_eq!(decoded, grid, "{} round trip", compression);

            let read_back = GeoReference::read(&reader, &mut file, ifd).unwrap();
            assert_eq!(read_back.tiepoint, Some([0.0, 0.0, 0.0, 103.0, 198.0, 0.0]));
            assert_eq!(read_back.geo_keys.unwrap().directory[15], 4326);

            let xml = reader.read_ascii(&mut file, ifd, tags::GDAL_METADATA).unwrap();
            let items = MetadataBuilder::parse_xml(&xml).unwrap();
            assert!(items.contains(&MetadataItem::dataset("ROLE", "MS")));
            assert!(items.contains(&MetadataItem::band("SOURCE_MAX", 0, "900")));
            assert!(items.contains(&MetadataItem::band("SOURCE_MIN", 2, "7")));
        }
    }

    #[test]
    fn test_source_crs_copies_geo_keys() {
        let dir = tempdir().unwrap();
        let logger = Logger::console_only();
        let keys = GeoKeyBlock {
            directory: vec![1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32633],
            double_params: vec![],
            ascii_params: Some("WGS 84 / UTM zone 33N|".to_string()),
        };
        let georef = GeoReference { pixel_scale: None, tiepoint: None, geo_keys: Some(keys.clone()) };
        let exporter = TileExporter::new(&logger, CompressionKind::None, CrsMode::Source, Some(georef));
        let path = dir.path().join("P_x").join("P_1.tif");
        exporter.export(&sample_tile(1), &info(Role::Panchromatic, &[BandRange { min: 0.0, max: 1.0 }]), &path).unwrap();

        let mut reader = TiffReader::new(&logger);
        let tiff = reader.load(&path).unwrap();
        let mut file = reader.create_reader().unwrap();
        let read_back = GeoReference::read(&reader, &mut file, tiff.main_ifd().unwrap()).unwrap();
        assert_eq!(read_back.geo_keys, Some(keys));
        // No source transform: tiles are placed in pixel space
        assert_eq!(read_back.tiepoint, Some([0.0, 0.0, 0.0, 6.0, 4.0, 0.0]));
    }

    #[test]
    fn test_malformed_source_geo_keys_fall_back_to_wgs84() {
        let dir = tempdir().unwrap();
        let logger = Logger::console_only();
        // Header declares two keys but only one entry follows
        let keys = GeoKeyBlock { directory: vec![1, 1, 0, 2, 1024, 0, 1, 1], double_params: vec![], ascii_params: None };
        assert!(!keys.is_well_formed());
        let georef = GeoReference { pixel_scale: None, tiepoint: None, geo_keys: Some(keys) };
        let exporter = TileExporter::new(&logger, CompressionKind::None, CrsMode::Source, Some(georef));

        let path = dir.path().join("P_x").join("P_2.tif");
        exporter.export(&sample_tile(1), &info(Role::Panchromatic, &[BandRange { min: 0.0, max: 1.0 }]), &path).unwrap();

        let mut reader = TiffReader::new(&logger);
        let tiff = reader.load(&path).unwrap();
        let mut file = reader.create_reader().unwrap();
        let read_back = GeoReference::read(&reader, &mut file, tiff.main_ifd().unwrap()).unwrap();
        assert_eq!(read_back.geo_keys.unwrap().directory[15], 4326);
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();

        let logger = Logger::console_only();
        let exporter = TileExporter::new(&logger, CompressionKind::None, CrsMode::Wgs84, None);
        let result = exporter.export(&sample_tile(1), &info(Role::Panchromatic, &[]), &blocker.join("P_1.tif"));
        assert!(matches!(result, Err(PipelineError::DestinationWrite { .. })));
    }

    #[test]
    fn test_rejects_wide_samples() {
        let logger = Logger::console_only();
        let exporter = TileExporter::new(&logger, CompressionKind::None, CrsMode::Wgs84, None);
        let grid: RasterGrid = Array3::<u16>::zeros((2, 2, 1)).into();
        let result = exporter.export(&grid, &info(Role::Panchromatic, &[]), Path::new("unused.tif"));
        assert!(matches!(result, Err(PipelineError::InvalidState { .. })));
    }
}
