//! Tile output

pub mod exporter;

pub use exporter::{tile_path, TileExporter, TileInfo};
