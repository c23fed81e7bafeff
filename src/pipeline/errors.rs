//! Error taxonomy of the tiling pipeline

use std::fmt;
use std::path::PathBuf;

use crate::tiff::errors::TiffError;
use crate::tiling::indexer::TileBox;

/// Failures raised by the pipeline and its components
#[derive(Debug)]
pub enum PipelineError {
    /// A source raster is missing, not a raster, or failed to decode
    SourceUnreadable { path: PathBuf, reason: String },
    /// A tile box does not fit inside an aligned grid
    Bounds { tile: TileBox, height: usize, width: usize },
    /// A tile file could not be written
    DestinationWrite { path: PathBuf, reason: String },
    /// Malformed option or configuration file
    InvalidConfiguration(String),
    /// A driver transition was requested out of order
    InvalidState { expected: String, actual: String },
    /// Low-level codec error
    Tiff(TiffError),
}

impl PipelineError {
    pub fn source_unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::SourceUnreadable { path: path.into(), reason: reason.to_string() }
    }

    pub fn destination_write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::DestinationWrite { path: path.into(), reason: reason.to_string() }
    }

    /// Whether the run may continue with the next tile
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::DestinationWrite { .. })
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::SourceUnreadable { path, reason } => {
                write!(f, "Cannot read source raster {}: {}", path.display(), reason)
            }
            PipelineError::Bounds { tile, height, width } => {
                write!(f, "Tile {} exceeds grid of {}x{} pixels", tile, width, height)
            }
            PipelineError::DestinationWrite { path, reason } => {
                write!(f, "Cannot write {}: {}", path.display(), reason)
            }
            PipelineError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            PipelineError::InvalidState { expected, actual } => {
                write!(f, "Pipeline is {}, expected {}", actual, expected)
            }
            PipelineError::Tiff(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Tiff(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TiffError> for PipelineError {
    fn from(error: TiffError) -> Self {
        PipelineError::Tiff(error)
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
