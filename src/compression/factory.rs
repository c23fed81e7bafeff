//! Factory for creating compression handlers

use std::fmt;

use crate::tiff::constants::compression;
use crate::tiff::errors::{TiffError, TiffResult};
use super::handler::CompressionHandler;
use super::uncompressed::UncompressedHandler;
use super::deflate::AdobeDeflateHandler;
use super::zstd::ZstdHandler;

/// Compression applied to exported tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionKind {
    #[default]
    None,
    Deflate,
    Zstd,
}

impl CompressionKind {
    /// Parses a user-supplied compression name
    pub fn from_name(name: &str) -> TiffResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "none" | "uncompressed" => Ok(CompressionKind::None),
            "deflate" | "zip" | "adobe deflate" => Ok(CompressionKind::Deflate),
            "zstd" | "zstandard" => Ok(CompressionKind::Zstd),
            _ => Err(TiffError::GenericError(format!("Unknown compression type: {}", name))),
        }
    }

    pub fn handler(&self) -> Box<dyn CompressionHandler> {
        match self {
            CompressionKind::None => Box::new(UncompressedHandler),
            CompressionKind::Deflate => Box::new(AdobeDeflateHandler::new()),
            CompressionKind::Zstd => Box::new(ZstdHandler::new()),
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionKind::None => "none",
            CompressionKind::Deflate => "deflate",
            CompressionKind::Zstd => "zstd",
        };
        write!(f, "{}", name)
    }
}

/// Factory for creating compression handlers
pub struct CompressionFactory;

impl CompressionFactory {
    /// Handler for a Compression tag value found in a source file
    pub fn create_handler(code: u64) -> TiffResult<Box<dyn CompressionHandler>> {
        match u16::try_from(code).unwrap_or(0) {
            compression::NONE => Ok(Box::new(UncompressedHandler)),
            compression::DEFLATE | compression::DEFLATE_LEGACY => Ok(Box::new(AdobeDeflateHandler::new())),
            c @ (compression::ZSTD | compression::ZSTD_LIBTIFF) => Ok(Box::new(ZstdHandler::with_code(c))),
            _ => Err(TiffError::UnsupportedCompression(code)),
        }
    }
}
