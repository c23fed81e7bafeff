//! TIFF and BigTIFF codec
//!
//! Structure parsing for source rasters and a small builder/writer for the
//! single-image GeoTIFFs this crate exports.

pub mod errors;
pub mod ifd;
pub mod types;
pub mod reader;
pub mod builder;
pub mod builders;
pub mod constants;
pub(crate) mod validation;

#[cfg(test)]
pub(crate) mod tests;

pub use crate::io::byte_order::{BigEndianHandler, ByteOrder, ByteOrderHandler, LittleEndianHandler};
pub use errors::{TiffError, TiffResult};
pub use ifd::{IFD, IFDEntry};
pub use reader::TiffReader;
pub use types::TIFF;
pub use builder::TiffBuilder;
pub use builders::metadata_tags::{MetadataBuilder, MetadataItem};
