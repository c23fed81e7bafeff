//! Alignment, windowing and per-tile processing

pub mod align;
pub mod extract;
pub mod identifier;
pub mod indexer;
pub mod normalize;

pub use align::align;
pub use extract::{AlignedTriplet, Role, TileExtractor, TileTriplet};
pub use identifier::IdentifierGenerator;
pub use indexer::{tile_count, tiles, TileBox};
pub use normalize::{normalize, BandRange};
