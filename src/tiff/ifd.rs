//! Image File Directory (IFD) structures
//!
//! An IFD is the tag table describing one image inside a TIFF file. The
//! source reader only ever decodes the first one, and the tile writer emits
//! exactly one per output file.

use std::collections::HashMap;
use std::fmt;
use log::{debug, trace};

use crate::tiff::constants::{field_types, planar_config, tags};
use crate::utils::tag_utils;

/// An Image File Directory
#[derive(Debug, Clone)]
pub struct IFD {
    /// Entries in insertion order
    pub entries: Vec<IFDEntry>,
    /// IFD number (0-based)
    pub number: usize,
    /// Offset to this IFD in the file
    pub offset: u64,
    /// Lookup cache by tag id
    tag_map: HashMap<u16, IFDEntry>,
}

/// One tag of an IFD
///
/// For values that fit into the entry (4 bytes, 8 for BigTIFF) `value_offset`
/// holds the value itself, otherwise the file offset of the value array.
#[derive(Debug, Clone)]
pub struct IFDEntry {
    pub tag: u16,
    pub field_type: u16,
    pub count: u64,
    pub value_offset: u64,
}

impl IFDEntry {
    pub fn new(tag: u16, field_type: u16, count: u64, value_offset: u64) -> Self {
        trace!("IFD entry: tag={} ({}), type={} ({}), count={}, value/offset={}",
               tag, tag_utils::get_tag_name(tag),
               field_type, tag_utils::get_field_type_name(field_type),
               count, value_offset);

        Self {
            tag,
            field_type,
            count,
            value_offset,
        }
    }

    /// Size in bytes of a single value of this entry's field type
    pub fn get_field_type_size(&self) -> usize {
        match self.field_type {
            field_types::BYTE | field_types::ASCII | field_types::SBYTE | field_types::UNDEFINED => 1,
            field_types::SHORT | field_types::SSHORT => 2,
            field_types::LONG | field_types::SLONG | field_types::FLOAT => 4,
            field_types::RATIONAL | field_types::SRATIONAL | field_types::DOUBLE => 8,
            field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => 8,
            _ => {
                debug!("Unknown field type: {}, assuming 1 byte", self.field_type);
                1
            }
        }
    }

    /// Total payload size in bytes
    pub fn data_size(&self) -> usize {
        self.get_field_type_size().saturating_mul(usize::try_from(self.count).unwrap_or(usize::MAX))
    }

    /// Whether the payload lives in the entry's value field
    pub fn is_value_inline(&self, is_big_tiff: bool) -> bool {
        let inline_size = if is_big_tiff { 8 } else { 4 };
        self.data_size() <= inline_size
    }
}

impl IFD {
    pub fn new(number: usize, offset: u64) -> Self {
        Self {
            entries: Vec::new(),
            number,
            offset,
            tag_map: HashMap::new(),
        }
    }

    /// Adds an entry, replacing any earlier entry with the same tag
    pub fn add_entry(&mut self, entry: IFDEntry) {
        self.entries.retain(|e| e.tag != entry.tag);
        self.tag_map.insert(entry.tag, entry.clone());
        self.entries.push(entry);
    }

    /// Value field of a tag, as stored in the entry
    pub fn get_tag_value(&self, tag: u16) -> Option<u64> {
        self.tag_map.get(&tag).map(|entry| entry.value_offset)
    }

    pub fn has_tag(&self, tag: u16) -> bool {
        self.tag_map.contains_key(&tag)
    }

    pub fn get_entry(&self, tag: u16) -> Option<&IFDEntry> {
        self.tag_map.get(&tag)
    }

    /// Width and height of the image, if both tags are present
    pub fn get_dimensions(&self) -> Option<(u64, u64)> {
        let width = self.get_tag_value(tags::IMAGE_WIDTH)?;
        let height = self.get_tag_value(tags::IMAGE_LENGTH)?;
        Some((width, height))
    }

    /// Number of samples per pixel, 1 when the tag is absent
    pub fn get_samples_per_pixel(&self) -> u64 {
        self.get_tag_value(tags::SAMPLES_PER_PIXEL).unwrap_or(1)
    }

    /// Whether pixel data is organized in tiles rather than strips
    pub fn is_tiled(&self) -> bool {
        self.has_tag(tags::TILE_WIDTH) && self.has_tag(tags::TILE_LENGTH)
    }

    /// Whether each band is stored in its own plane
    pub fn is_planar(&self) -> bool {
        self.get_tag_value(tags::PLANAR_CONFIGURATION)
            .map(|v| v as u16 == planar_config::PLANAR)
            .unwrap_or(false)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for IFD {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IFD #{} (offset: {})", self.number, self.offset)?;

        if let Some((width, height)) = self.get_dimensions() {
            writeln!(f, "  Dimensions: {}x{}", width, height)?;
        }
        writeln!(f, "  Samples per pixel: {}", self.get_samples_per_pixel())?;

        for entry in &self.entries {
            let value_display = match entry.tag {
                tags::COMPRESSION => format!("{} ({})",
                                             entry.value_offset,
                                             tag_utils::get_compression_name(entry.value_offset)),
                _ => entry.value_offset.to_string(),
            };

            writeln!(f, "    {} ({}): {} [{}]",
                     entry.tag,
                     tag_utils::get_tag_name(entry.tag),
                     value_display,
                     tag_utils::get_field_type_name(entry.field_type))?;
        }

        Ok(())
    }
}
