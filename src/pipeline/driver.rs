//! Pipeline orchestration
//!
//! The driver walks `Idle -> SourcesLoaded -> Aligned -> Tiling -> Done`.
//! Each transition has its own method so callers (and the dry-run command)
//! can stop after any step; `run` performs all of them. Any fatal error
//! moves the driver to `Failed`.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::export::exporter::{tile_path, TileExporter, TileInfo};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::errors::{PipelineError, PipelineResult};
use crate::pipeline::summary::{RunSummary, TileFailure};
use crate::raster::georef::GeoReference;
use crate::raster::source::RasterSource;
use crate::tiling::align::align;
use crate::tiling::extract::{AlignedTriplet, Role, TileExtractor};
use crate::tiling::identifier::IdentifierGenerator;
use crate::tiling::indexer::{self, TileBox};
use crate::tiling::normalize::normalize;
use crate::utils::logger::Logger;
use crate::utils::progress::ProgressTracker;
use crate::utils::string_utils;

/// Driver states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    SourcesLoaded,
    Aligned,
    Tiling,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Cooperative cancellation flag, checked before each tile
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The three decoded sources, before alignment
struct LoadedSources {
    multispectral: RasterSource,
    panchromatic: RasterSource,
    pansharpened: RasterSource,
}

/// Files written for one tile box
struct TileOutcome {
    files_written: usize,
    failures: Vec<TileFailure>,
}

/// Runs the tiling pipeline for one configuration
pub struct PipelineDriver<'a> {
    config: PipelineConfig,
    logger: &'a Logger,
    state: PipelineState,
    sources: Option<LoadedSources>,
    aligned: Option<AlignedTriplet>,
    /// Georeferencing of the panchromatic grid, which all roles share after alignment
    georef: Option<GeoReference>,
    identifiers: IdentifierGenerator,
    cancellation: CancellationToken,
}

impl<'a> PipelineDriver<'a> {
    pub fn new(config: PipelineConfig, logger: &'a Logger) -> Self {
        PipelineDriver {
            config,
            logger,
            state: PipelineState::Idle,
            sources: None,
            aligned: None,
            georef: None,
            identifiers: IdentifierGenerator::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token that stops the tiling loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// The aligned grids, once `align` has run
    pub fn aligned(&self) -> Option<&AlignedTriplet> {
        self.aligned.as_ref()
    }

    fn expect_state(&self, expected: PipelineState) -> PipelineResult<()> {
        if self.state != expected {
            return Err(PipelineError::InvalidState {
                expected: expected.to_string(),
                actual: self.state.to_string(),
            });
        }
        Ok(())
    }

    fn fail(&mut self, error: PipelineError) -> PipelineError {
        error!("Pipeline failed: {}", error);
        self.journal(&format!("FAILED: {}", error));
        self.state = PipelineState::Failed;
        error
    }

    fn journal(&self, message: &str) {
        if let Err(e) = self.logger.log(message) {
            warn!("Could not write to journal: {}", e);
        }
    }

    /// Opens the three sources
    pub fn load_sources(&mut self) -> PipelineResult<()> {
        self.expect_state(PipelineState::Idle)?;
        info!("Loading sources: MS {}, P {}, PAN {}",
              self.config.multispectral.display(),
              self.config.panchromatic.display(),
              self.config.pansharpened.display());

        let open = |path: &PathBuf| RasterSource::open(path, self.logger);
        let loaded = open(&self.config.multispectral).and_then(|multispectral| {
            let panchromatic = open(&self.config.panchromatic)?;
            let pansharpened = open(&self.config.pansharpened)?;
            Ok(LoadedSources { multispectral, panchromatic, pansharpened })
        });

        match loaded {
            Ok(sources) => {
                self.journal(&format!("Sources loaded: MS {}, P {}, PAN {}",
                                      sources.multispectral.grid,
                                      sources.panchromatic.grid,
                                      sources.pansharpened.grid));
                self.sources = Some(sources);
                self.state = PipelineState::SourcesLoaded;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Resamples the multispectral and pansharpened grids onto the
    /// panchromatic grid
    pub fn align(&mut self) -> PipelineResult<()> {
        self.expect_state(PipelineState::SourcesLoaded)?;
        let sources = match self.sources.take() {
            Some(sources) => sources,
            None => return Err(self.fail(PipelineError::InvalidState {
                expected: "loaded sources".to_string(),
                actual: "none".to_string(),
            })),
        };

        let (height, width) = (sources.panchromatic.height(), sources.panchromatic.width());
        info!("Aligning sources to the {}x{} panchromatic grid", width, height);

        let multispectral = align(sources.multispectral.grid, height, width);
        let pansharpened = align(sources.pansharpened.grid, height, width);
        self.georef = sources.panchromatic.georef;

        match AlignedTriplet::new(multispectral, sources.panchromatic.grid, pansharpened) {
            Ok(aligned) => {
                let [ms, p, pan] = aligned.band_counts();
                self.journal(&format!("Aligned to {}x{} (bands MS {}, P {}, PAN {})", width, height, ms, p, pan));
                self.aligned = Some(aligned);
                self.state = PipelineState::Aligned;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Tile boxes of the aligned grid, without processing them
    pub fn plan(&self) -> PipelineResult<Vec<TileBox>> {
        self.expect_state(PipelineState::Aligned)?;
        let aligned = self.aligned.as_ref().ok_or_else(|| PipelineError::InvalidState {
            expected: "aligned grids".to_string(),
            actual: "none".to_string(),
        })?;
        let size = self.config.tile_size;
        Ok(indexer::tiles(aligned.height(), aligned.width(), size.width, size.height))
    }

    /// Extracts, normalizes and exports every tile
    pub fn run_tiles(&mut self) -> PipelineResult<RunSummary> {
        let boxes = self.plan()?;
        self.state = PipelineState::Tiling;
        info!("Exporting {} tile(s) of {} to {}", boxes.len(), self.config.tile_size, self.config.destination.display());
        self.journal(&format!("Tiling: {} box(es) of {}", boxes.len(), self.config.tile_size));

        match self.export_all(&boxes) {
            Ok(summary) => {
                self.state = PipelineState::Done;
                self.journal(&format!("Done: {} exported, {} failed, {} file(s)",
                                      summary.exported, summary.failed, summary.files_written));
                Ok(summary)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Loads, aligns and tiles in one go
    pub fn run(&mut self) -> PipelineResult<RunSummary> {
        self.load_sources()?;
        self.align()?;
        self.run_tiles()
    }

    fn export_all(&self, boxes: &[TileBox]) -> PipelineResult<RunSummary> {
        let aligned = self.aligned.as_ref().ok_or_else(|| PipelineError::InvalidState {
            expected: "aligned grids".to_string(),
            actual: "none".to_string(),
        })?;
        let extractor = TileExtractor::new(aligned);
        let exporter = TileExporter::new(self.logger, self.config.compression, self.config.crs, self.georef.clone());
        let stem = string_utils::file_stem(&self.config.multispectral);

        let progress = if self.config.progress {
            ProgressTracker::new(boxes.len() as u64, "Exporting tiles")
        } else {
            ProgressTracker::hidden(boxes.len() as u64)
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| PipelineError::InvalidConfiguration(format!("cannot start worker pool: {}", e)))?;
        debug!("Worker pool with {} thread(s)", pool.current_num_threads());

        let outcomes: Vec<Option<TileOutcome>> = pool.install(|| {
            boxes.par_iter()
                .map(|tile| -> PipelineResult<Option<TileOutcome>> {
                    if self.cancellation.is_cancelled() {
                        return Ok(None);
                    }
                    let outcome = self.process_tile(&extractor, &exporter, &stem, tile)?;
                    progress.increment(1);
                    Ok(Some(outcome))
                })
                .collect::<PipelineResult<Vec<_>>>()
        })?;

        let mut summary = RunSummary::new(boxes.len());
        for outcome in outcomes.into_iter().flatten() {
            summary.record(outcome.files_written, outcome.failures);
        }
        summary.cancelled = self.cancellation.is_cancelled() && summary.attempted < summary.planned;

        if summary.cancelled {
            progress.abandon("cancelled");
            warn!("Run cancelled after {} of {} tile(s)", summary.attempted, summary.planned);
        } else {
            progress.finish();
        }
        Ok(summary)
    }

    /// One box: extract, normalize each role, mint an identifier, export
    ///
    /// A file that cannot be written is recorded and the remaining roles are
    /// still exported; any other error aborts the run.
    fn process_tile(
        &self,
        extractor: &TileExtractor,
        exporter: &TileExporter,
        stem: &str,
        tile: &TileBox
    ) -> PipelineResult<TileOutcome> {
        let triplet = extractor.extract(tile)?;
        let identifier = self.identifiers.next();
        let mut outcome = TileOutcome { files_written: 0, failures: Vec::new() };

        for role in Role::ALL {
            let (grid, ranges) = normalize(triplet.grid(role));
            let path = tile_path(&self.config.destination, stem, role, &identifier);
            let info = TileInfo { role, identifier: &identifier, tile: *tile, ranges: &ranges };

            match exporter.export(&grid, &info, &path) {
                Ok(()) => outcome.files_written += 1,
                Err(e) if e.is_recoverable() => {
                    error!("Tile {} {} ({}) failed: {}", identifier, tile, role, e);
                    outcome.failures.push(TileFailure {
                        identifier: identifier.clone(),
                        tile: *tile,
                        role,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        debug!("Tile {} {}: {} file(s)", identifier, tile, outcome.files_written);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::TileSize;
    use crate::tiff::builder::TiffBuilder;
    use std::path::Path;
    use tempfile::tempdir;

    /// Writes an 8-bit raster whose samples are `(x + y + band) % 256`
    fn write_raster(path: &Path, width: u32, height: u32, bands: u16) {
        let logger = Logger::console_only();
        let mut builder = TiffBuilder::new(&logger, false);
        let ifd = builder.add_ifd();
        builder.add_raster_tags(ifd, width, height, bands, 8).unwrap();
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                for b in 0..bands as u32 {
                    data.push(((x + y + b) % 256) as u8);
                }
            }
        }
        builder.setup_single_strip(ifd, data).unwrap();
        builder.write(path).unwrap();
    }

    fn sources(dir: &Path, ms: (u32, u16), p: u32, pan: (u32, u16)) -> PipelineConfig {
        let ms_path = dir.join("scene_ms.tif");
        let p_path = dir.join("scene_p.tif");
        let pan_path = dir.join("scene_pan.tif");
        write_raster(&ms_path, ms.0, ms.0, ms.1);
        write_raster(&p_path, p, p, 1);
        write_raster(&pan_path, pan.0, pan.0, pan.1);
        PipelineConfig::new(ms_path, p_path, pan_path)
            .with_destination(dir.join("out"))
            .with_progress(false)
    }

    #[test]
    fn test_state_transitions() {
        let dir = tempdir().unwrap();
        let logger = Logger::console_only();
        let config = sources(dir.path(), (8, 4), 16, (16, 3)).with_tile_size(TileSize::new(8, 8));
        let mut driver = PipelineDriver::new(config, &logger);

        assert_eq!(driver.state(), PipelineState::Idle);
        assert!(matches!(driver.align(), Err(PipelineError::InvalidState { .. })));
        assert!(matches!(driver.run_tiles(), Err(PipelineError::InvalidState { .. })));
        assert_eq!(driver.state(), PipelineState::Idle);

        driver.load_sources().unwrap();
        assert_eq!(driver.state(), PipelineState::SourcesLoaded);
        assert!(driver.plan().is_err());

        driver.align().unwrap();
        assert_eq!(driver.state(), PipelineState::Aligned);
        assert_eq!(driver.aligned().unwrap().band_counts(), [4, 1, 3]);
        assert_eq!(driver.plan().unwrap().len(), 4);

        let summary = driver.run_tiles().unwrap();
        assert_eq!(driver.state(), PipelineState::Done);
        assert_eq!(summary.files_written, 12);
        assert!(summary.is_complete());
        assert!(matches!(driver.load_sources(), Err(PipelineError::InvalidState { .. })));
    }

    #[test]
    fn test_missing_source_fails_before_tiling() {
        let dir = tempdir().unwrap();
        let logger = Logger::console_only();
        let mut config = sources(dir.path(), (8, 4), 16, (16, 3));
        config.pansharpened = dir.path().join("absent.tif");
        let mut driver = PipelineDriver::new(config, &logger);

        assert!(matches!(driver.run(), Err(PipelineError::SourceUnreadable { .. })));
        assert_eq!(driver.state(), PipelineState::Failed);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_cancelled_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let logger = Logger::console_only();
        let config = sources(dir.path(), (8, 4), 16, (16, 3)).with_tile_size(TileSize::new(4, 4));
        let mut driver = PipelineDriver::new(config, &logger);
        driver.cancellation_token().cancel();

        let summary = driver.run().unwrap();
        assert_eq!(driver.state(), PipelineState::Done);
        assert!(summary.cancelled);
        assert_eq!(summary.planned, 16);
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.files_written, 0);
    }

    #[test]
    fn test_unwritable_role_is_recorded_and_run_continues() {
        let dir = tempdir().unwrap();
        let logger = Logger::console_only();
        let config = sources(dir.path(), (8, 4), 16, (16, 3)).with_tile_size(TileSize::new(8, 8));
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("PAN_scene_ms"), b"not a directory").unwrap();
        let mut driver = PipelineDriver::new(config, &logger);

        let summary = driver.run().unwrap();
        assert_eq!(driver.state(), PipelineState::Done);
        assert_eq!(summary.planned, 4);
        assert_eq!(summary.attempted, 4);
        assert_eq!(summary.exported, 0);
        assert_eq!(summary.failed, summary.planned);
        assert_eq!(summary.files_written, 2 * summary.planned);
        assert!(!summary.is_complete());
        assert_eq!(summary.failures.len(), 4);

        let mut boxes: Vec<TileBox> = summary.failures.iter().map(|f| f.tile).collect();
        boxes.sort_by_key(|b| (b.y0, b.x0));
        assert_eq!(boxes, indexer::tiles(16, 16, 8, 8));
        for failure in &summary.failures {
            assert_eq!(failure.role, Role::Pansharpened);
            for role in [Role::Multispectral, Role::Panchromatic] {
                assert!(tile_path(&out, "scene_ms", role, &failure.identifier).is_file());
            }
        }
    }

    #[test]
    fn test_parallel_workers_export_every_tile() {
        let dir = tempdir().unwrap();
        let logger = Logger::console_only();
        let config = sources(dir.path(), (16, 2), 32, (32, 3))
            .with_tile_size(TileSize::new(8, 8))
            .with_workers(4);
        let mut driver = PipelineDriver::new(config, &logger);

        let summary = driver.run().unwrap();
        assert_eq!(summary.exported, 16);
        assert_eq!(summary.files_written, 48);
        let ms_dir = dir.path().join("out").join("MS_scene_ms");
        assert_eq!(std::fs::read_dir(ms_dir).unwrap().count(), 16);
    }
}
