//! Pipeline configuration, orchestration and reporting

pub mod config;
pub mod driver;
pub mod errors;
pub mod summary;

pub use config::{CrsMode, PipelineConfig, TileSize};
pub use driver::{CancellationToken, PipelineDriver, PipelineState};
pub use errors::{PipelineError, PipelineResult};
pub use summary::{RunSummary, TileFailure};
