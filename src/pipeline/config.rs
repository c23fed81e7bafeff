//! Pipeline configuration
//!
//! A `PipelineConfig` is an immutable value handed to the driver. It is
//! assembled from defaults, an optional TOML file and command line flags,
//! in that order of precedence.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

use crate::compression::CompressionKind;
use crate::pipeline::errors::{PipelineError, PipelineResult};

lazy_static! {
    static ref TILE_SIZE_PATTERN: Option<Regex> = Regex::new(r"^\s*(\d+)\s*[xX×]\s*(\d+)\s*$").ok();
}

/// Tile dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSize {
    pub width: usize,
    pub height: usize,
}

impl Default for TileSize {
    fn default() -> Self {
        TileSize { width: 256, height: 256 }
    }
}

impl TileSize {
    pub fn new(width: usize, height: usize) -> Self {
        TileSize { width, height }
    }

    /// Parses `WIDTHxHEIGHT`, e.g. `256x256` or `512 X 128`
    pub fn parse(value: &str) -> PipelineResult<Self> {
        let captures = TILE_SIZE_PATTERN.as_ref().and_then(|re| re.captures(value)).ok_or_else(|| {
            PipelineError::InvalidConfiguration(format!("tile size '{}' is not of the form WIDTHxHEIGHT", value))
        })?;

        let dimension = |index: usize| -> PipelineResult<usize> {
            captures[index].parse::<usize>()
                .ok()
                .filter(|&v| v > 0)
                .ok_or_else(|| PipelineError::InvalidConfiguration(
                    format!("tile size '{}' needs positive dimensions", value)))
        };

        Ok(TileSize { width: dimension(1)?, height: dimension(2)? })
    }

    /// Like `parse`, but a malformed value falls back to the default size
    pub fn parse_or_default(value: &str) -> Self {
        match Self::parse(value) {
            Ok(size) => size,
            Err(e) => {
                let fallback = TileSize::default();
                warn!("{}; using {}", e, fallback);
                fallback
            }
        }
    }
}

impl fmt::Display for TileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Coordinate reference written into exported tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrsMode {
    /// Geographic WGS84 (EPSG:4326)
    #[default]
    Wgs84,
    /// GeoKeys copied from the panchromatic source
    Source,
}

impl CrsMode {
    pub fn from_name(name: &str) -> PipelineResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "wgs84" | "epsg:4326" | "4326" => Ok(CrsMode::Wgs84),
            "source" => Ok(CrsMode::Source),
            other => Err(PipelineError::InvalidConfiguration(
                format!("unknown CRS mode '{}' (expected wgs84 or source)", other))),
        }
    }
}

impl fmt::Display for CrsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsMode::Wgs84 => write!(f, "wgs84"),
            CrsMode::Source => write!(f, "source"),
        }
    }
}

/// Everything the driver needs for one run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub multispectral: PathBuf,
    pub panchromatic: PathBuf,
    pub pansharpened: PathBuf,
    /// Root of the role directories
    pub destination: PathBuf,
    pub tile_size: TileSize,
    /// Worker threads for tile export; 0 uses one per core
    pub workers: usize,
    pub crs: CrsMode,
    pub compression: CompressionKind,
    pub progress: bool,
}

impl PipelineConfig {
    /// Defaults: 256x256 tiles into the current directory, one worker,
    /// WGS84 tags, no compression, progress bar on
    pub fn new(multispectral: impl Into<PathBuf>, panchromatic: impl Into<PathBuf>, pansharpened: impl Into<PathBuf>) -> Self {
        PipelineConfig {
            multispectral: multispectral.into(),
            panchromatic: panchromatic.into(),
            pansharpened: pansharpened.into(),
            destination: PathBuf::from("."),
            tile_size: TileSize::default(),
            workers: 1,
            crs: CrsMode::default(),
            compression: CompressionKind::default(),
            progress: true,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_tile_size(mut self, tile_size: TileSize) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_crs(mut self, crs: CrsMode) -> Self {
        self.crs = crs;
        self
    }

    pub fn with_compression(mut self, compression: CompressionKind) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Applies the settings of a TOML file
    pub fn with_toml_file(self, path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| PipelineError::InvalidConfiguration(
            format!("cannot read {}: {}", path.display(), e)))?;
        debug!("Loading configuration from {}", path.display());
        self.with_toml_str(&content)
    }

    /// Applies TOML settings; unknown keys are ignored with a warning
    ///
    /// ```toml
    /// tile_size = "512x512"
    /// destination = "tiles"
    /// workers = 4
    /// crs = "source"
    /// compression = "deflate"
    /// progress = false
    /// ```
    pub fn with_toml_str(mut self, content: &str) -> PipelineResult<Self> {
        let table: toml::Table = toml::from_str(content)
            .map_err(|e| PipelineError::InvalidConfiguration(format!("failed to parse TOML: {}", e)))?;

        for (key, value) in &table {
            let invalid = || PipelineError::InvalidConfiguration(format!("invalid value for '{}': {}", key, value));
            match key.as_str() {
                "tile_size" => {
                    self.tile_size = match value {
                        toml::Value::String(s) => TileSize::parse_or_default(s),
                        toml::Value::Table(t) => {
                            let width = t.get("width").and_then(|v| v.as_integer()).ok_or_else(invalid)?;
                            let height = t.get("height").and_then(|v| v.as_integer()).ok_or_else(invalid)?;
                            TileSize::parse_or_default(&format!("{}x{}", width, height))
                        }
                        _ => return Err(invalid()),
                    };
                }
                "destination" => self.destination = PathBuf::from(value.as_str().ok_or_else(invalid)?),
                "workers" => {
                    self.workers = value.as_integer()
                        .and_then(|w| usize::try_from(w).ok())
                        .ok_or_else(invalid)?;
                }
                "crs" => self.crs = CrsMode::from_name(value.as_str().ok_or_else(invalid)?)?,
                "compression" => {
                    self.compression = CompressionKind::from_name(value.as_str().ok_or_else(invalid)?)
                        .map_err(|e| PipelineError::InvalidConfiguration(e.to_string()))?;
                }
                "progress" => self.progress = value.as_bool().ok_or_else(invalid)?,
                other => warn!("Ignoring unknown configuration key '{}'", other),
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_size_parsing() {
        assert_eq!(TileSize::parse("256x256").unwrap(), TileSize::new(256, 256));
        assert_eq!(TileSize::parse(" 512 X 128 ").unwrap(), TileSize::new(512, 128));
        assert_eq!(TileSize::parse("64×32").unwrap(), TileSize::new(64, 32));
        assert!(matches!(TileSize::parse("256"), Err(PipelineError::InvalidConfiguration(_))));
        assert!(TileSize::parse("0x256").is_err());
        assert!(TileSize::parse("-4x4").is_err());
        assert!(TileSize::parse("99999999999999999999999x1").is_err());
    }

    #[test]
    fn test_malformed_tile_size_falls_back() {
        assert_eq!(TileSize::parse_or_default("big"), TileSize::default());
        assert_eq!(TileSize::parse_or_default("128x64"), TileSize::new(128, 64));
        assert_eq!(TileSize::default().to_string(), "256x256");
    }

    #[test]
    fn test_crs_names() {
        assert_eq!(CrsMode::from_name("WGS84").unwrap(), CrsMode::Wgs84);
        assert_eq!(CrsMode::from_name("EPSG:4326").unwrap(), CrsMode::Wgs84);
        assert_eq!(CrsMode::from_name("source").unwrap(), CrsMode::Source);
        assert!(CrsMode::from_name("utm").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new("ms.tif", "p.tif", "pan.tif");
        assert_eq!(config.destination, PathBuf::from("."));
        assert_eq!(config.tile_size, TileSize::new(256, 256));
        assert_eq!(config.workers, 1);
        assert_eq!(config.crs, CrsMode::Wgs84);
        assert_eq!(config.compression, CompressionKind::None);
        assert!(config.progress);
    }

    #[test]
    fn test_toml_settings() {
        let config = PipelineConfig::new("ms.tif", "p.tif", "pan.tif")
            .with_toml_str(r#"
                tile_size = "128x64"
                destination = "out"
                workers = 4
                crs = "source"
                compression = "zstd"
                progress = false
                colour = "blue"
            "#)
            .unwrap();

        assert_eq!(config.tile_size, TileSize::new(128, 64));
        assert_eq!(config.destination, PathBuf::from("out"));
        assert_eq!(config.workers, 4);
        assert_eq!(config.crs, CrsMode::Source);
        assert_eq!(config.compression, CompressionKind::Zstd);
        assert!(!config.progress);

        let config = PipelineConfig::new("a", "b", "c")
            .with_toml_str("tile_size = { width = 32, height = 16 }")
            .unwrap();
        assert_eq!(config.tile_size, TileSize::new(32, 16));
    }

    #[test]
    fn test_toml_errors() {
        let base = PipelineConfig::new("a", "b", "c");
        assert!(base.clone().with_toml_str("workers = -1").is_err());
        assert!(base.clone().with_toml_str("crs = \"mercator\"").is_err());
        assert!(base.clone().with_toml_str("compression = \"lzw\"").is_err());
        assert!(base.clone().with_toml_str("not toml at all").is_err());
        assert!(base.with_toml_file(Path::new("/nonexistent/pantile.toml")).is_err());

        // A malformed tile size is not fatal
        let config = PipelineConfig::new("a", "b", "c").with_toml_str("tile_size = \"wide\"").unwrap();
        assert_eq!(config.tile_size, TileSize::default());
    }
}
