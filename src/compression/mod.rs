//! Compression handling for TIFF chunks
//!
//! Strategies for decoding source strips/tiles and encoding exported tiles.

mod handler;
mod uncompressed;
mod deflate;
mod factory;
mod zstd;

pub use handler::CompressionHandler;
pub use uncompressed::UncompressedHandler;
pub use deflate::AdobeDeflateHandler;
pub use factory::{CompressionFactory, CompressionKind};
pub use zstd::ZstdHandler;
