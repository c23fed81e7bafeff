//! Compression handler trait definition

use crate::tiff::errors::TiffResult;

/// Strategy trait for one TIFF compression scheme
pub trait CompressionHandler: Send + Sync {
    /// Decodes one strip or tile
    fn decompress(&self, data: &[u8]) -> TiffResult<Vec<u8>>;

    /// Encodes one strip or tile
    fn compress(&self, data: &[u8]) -> TiffResult<Vec<u8>>;

    /// Human-readable name used in log lines
    fn name(&self) -> &'static str;

    /// Value written to the Compression tag
    fn code(&self) -> u16;
}
