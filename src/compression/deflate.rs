//! Adobe Deflate handler
//!
//! TIFF stores Deflate chunks as zlib streams. A few producers write raw
//! deflate data without the zlib wrapper, so decoding retries without it.

use std::io::{Read, Write};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::debug;

use crate::tiff::constants::compression;
use crate::tiff::errors::{TiffError, TiffResult};
use super::handler::CompressionHandler;

/// Compression codes 8 and 32946
pub struct AdobeDeflateHandler {
    level: Compression,
}

impl AdobeDeflateHandler {
    pub fn new() -> Self {
        AdobeDeflateHandler { level: Compression::default() }
    }
}

impl Default for AdobeDeflateHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionHandler for AdobeDeflateHandler {
    fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut decompressed = Vec::new();
        if ZlibDecoder::new(data).read_to_end(&mut decompressed).is_ok() {
            return Ok(decompressed);
        }

        debug!("Chunk is not a zlib stream, retrying as raw deflate");
        decompressed.clear();
        DeflateDecoder::new(data)
            .read_to_end(&mut decompressed)
            .map_err(|e| TiffError::GenericError(format!("Deflate decompression error: {}", e)))?;
        Ok(decompressed)
    }

    fn compress(&self, data: &[u8]) -> TiffResult<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn name(&self) -> &'static str {
        "Adobe Deflate"
    }

    fn code(&self) -> u16 {
        compression::DEFLATE
    }
}
