//! Zstandard handler

use log::{debug, warn};

use crate::tiff::constants::compression;
use crate::tiff::errors::{TiffError, TiffResult};
use super::handler::CompressionHandler;

/// Compression codes 14 and 50000
pub struct ZstdHandler {
    /// Compression level (1-22, default 3)
    compression_level: i32,
    code: u16,
}

impl ZstdHandler {
    pub fn new() -> Self {
        ZstdHandler {
            compression_level: 3,
            code: compression::ZSTD_LIBTIFF,
        }
    }

    /// Handler that reports `code` in the Compression tag
    pub(crate) fn with_code(code: u16) -> Self {
        ZstdHandler { code, ..Self::new() }
    }
}

impl Default for ZstdHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionHandler for ZstdHandler {
    fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        zstd::decode_all(data).map_err(|e| {
            warn!("ZSTD decompression error: {}", e);
            TiffError::GenericError(format!("ZSTD decompression error: {}", e))
        })
    }

    fn compress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        debug!("ZSTD compressing {} bytes at level {}", data.len(), self.compression_level);
        zstd::encode_all(data, self.compression_level)
            .map_err(|e| TiffError::GenericError(format!("ZSTD compression error: {}", e)))
    }

    fn name(&self) -> &'static str {
        "ZSTD"
    }

    fn code(&self) -> u16 {
        self.code
    }
}
