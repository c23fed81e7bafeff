//! Header and offset sanity checks
//!
//! Source products come from many producers; these checks make a malformed
//! file fail early with a readable error instead of seeking into garbage.

use log::{debug, error, warn};
use std::io::SeekFrom;

use crate::io::byte_order::ByteOrderHandler;
use crate::io::seekable::SeekableReader;
use crate::tiff::constants::header;
use crate::tiff::errors::{TiffError, TiffResult};

/// Rejects an IFD offset that points into the header or past the end of file
pub fn validate_ifd_offset(offset: u64, file_size: u64) -> TiffResult<()> {
    if offset >= file_size || offset < 8 {
        return Err(TiffError::GenericError(format!(
            "Invalid IFD offset: {} (file size: {})",
            offset, file_size
        )));
    }

    Ok(())
}

/// Size of the underlying stream, restoring the current position
///
/// Falls back to `u64::MAX` when the stream cannot report its end.
pub fn get_file_size(reader: &mut dyn SeekableReader) -> TiffResult<u64> {
    let current_position = reader.stream_position()?;
    let file_size = match reader.seek(SeekFrom::End(0)) {
        Ok(size) => size,
        Err(e) => {
            warn!("Could not determine file size: {}", e);
            u64::MAX
        }
    };
    reader.seek(SeekFrom::Start(current_position))?;

    Ok(file_size)
}

/// Checks the BigTIFF offset-size word (8) and reserved word (0)
pub fn validate_bigtiff_header(
    reader: &mut dyn SeekableReader,
    byte_order_handler: &dyn ByteOrderHandler
) -> TiffResult<()> {
    let offset_size = byte_order_handler.read_u16(reader)?;
    let zeros = byte_order_handler.read_u16(reader)?;
    debug!("BigTIFF offset size: {}, reserved: {}", offset_size, zeros);

    if offset_size != header::BIGTIFF_OFFSET_SIZE || zeros != 0 {
        error!("Invalid BigTIFF header: offset_size={}, zeros={}", offset_size, zeros);
        return Err(TiffError::InvalidBigTIFFHeader);
    }

    Ok(())
}

/// Checks that a decoded chunk holds at least `expected` bytes
pub fn validate_chunk_length(expected: usize, actual: usize) -> TiffResult<()> {
    if actual < expected {
        return Err(TiffError::TruncatedData { expected, actual });
    }
    Ok(())
}

/// Checks that `length` bytes at `offset` lie inside the file
pub fn validate_chunk_extent(offset: u64, length: u64, file_size: u64) -> TiffResult<()> {
    match offset.checked_add(length) {
        Some(end) if end <= file_size => Ok(()),
        _ => Err(TiffError::GenericError(format!(
            "Data at offset {} with length {} exceeds file size {}",
            offset, length, file_size
        ))),
    }
}
