//! TIFF writing helpers
//!
//! Offsets in the output file are kept on word boundaries.

use crate::tiff::errors::TiffResult;
use crate::tiff::ifd::IFDEntry;
use std::io::Write;

/// Next 4-byte aligned offset at or after `offset`
pub fn align_to_4_bytes(offset: u64) -> u64 {
    offset + calculate_padding(offset as usize) as u64
}

/// Number of zero bytes needed after `data_len` bytes to reach a word boundary
pub fn calculate_padding(data_len: usize) -> usize {
    (4 - (data_len % 4)) % 4
}

/// Writes the padding that follows a block of `data_len` bytes
pub fn write_padding(writer: &mut impl Write, data_len: usize) -> TiffResult<()> {
    let padding = calculate_padding(data_len);
    if padding > 0 {
        writer.write_all(&[0u8; 3][..padding])?;
    }
    Ok(())
}

/// Entries sorted by ascending tag, the last entry winning for duplicate tags
pub fn get_unique_sorted_entries(entries: &[IFDEntry]) -> Vec<IFDEntry> {
    let mut sorted: Vec<IFDEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match sorted.iter_mut().find(|e| e.tag == entry.tag) {
            Some(existing) => *existing = entry.clone(),
            None => sorted.push(entry.clone()),
        }
    }
    sorted.sort_by_key(|entry| entry.tag);
    sorted
}
