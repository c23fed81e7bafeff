//! IFD editing helpers shared by the tag builders
//!
//! Payloads are encoded little-endian, the byte order of every file this
//! crate writes. A payload that fits into the entry's value field is packed
//! inline; larger ones go to the builder's external data table.

use std::collections::BTreeMap;

use crate::tiff::constants::field_types;
use crate::tiff::ifd::{IFDEntry, IFD};

/// External tag payloads keyed by (IFD index, tag)
pub type ExternalData = BTreeMap<(usize, u16), Vec<u8>>;

/// Adds a tag whose payload is written outside the IFD
pub fn create_external_tag(
    ifd: &mut IFD,
    external_data: &mut ExternalData,
    ifd_index: usize,
    tag: u16,
    field_type: u16,
    count: u64,
    data: Vec<u8>
) {
    ifd.add_entry(IFDEntry::new(tag, field_type, count, 0));
    external_data.insert((ifd_index, tag), data);
}

/// Adds a tag from its encoded payload, inline when it fits
pub fn set_tag_payload(
    ifd: &mut IFD,
    external_data: &mut ExternalData,
    ifd_index: usize,
    tag: u16,
    field_type: u16,
    count: u64,
    data: Vec<u8>,
    is_big_tiff: bool
) {
    let inline_size = if is_big_tiff { 8 } else { 4 };
    if data.len() > inline_size {
        create_external_tag(ifd, external_data, ifd_index, tag, field_type, count, data);
        return;
    }

    external_data.remove(&(ifd_index, tag));
    let mut field = [0u8; 8];
    field[..data.len()].copy_from_slice(&data);
    ifd.add_entry(IFDEntry::new(tag, field_type, count, u64::from_le_bytes(field)));
}

/// Adds a SHORT array tag
pub fn set_short_values(
    ifd: &mut IFD,
    external_data: &mut ExternalData,
    ifd_index: usize,
    tag: u16,
    values: &[u16],
    is_big_tiff: bool
) {
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    set_tag_payload(ifd, external_data, ifd_index, tag, field_types::SHORT,
                    values.len() as u64, data, is_big_tiff);
}

/// Adds a DOUBLE array tag
pub fn set_double_values(
    ifd: &mut IFD,
    external_data: &mut ExternalData,
    ifd_index: usize,
    tag: u16,
    values: &[f64],
    is_big_tiff: bool
) {
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    set_tag_payload(ifd, external_data, ifd_index, tag, field_types::DOUBLE,
                    values.len() as u64, data, is_big_tiff);
}

/// Adds a NUL-terminated ASCII tag
pub fn set_ascii_value(
    ifd: &mut IFD,
    external_data: &mut ExternalData,
    ifd_index: usize,
    tag: u16,
    value: &str,
    is_big_tiff: bool
) {
    let data = crate::utils::string_utils::to_ascii_payload(value);
    let count = data.len() as u64;
    set_tag_payload(ifd, external_data, ifd_index, tag, field_types::ASCII, count, data, is_big_tiff);
}
