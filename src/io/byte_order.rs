//! Byte order handling for TIFF sources
//!
//! A TIFF file declares its endianness in the first two header bytes and every
//! multi-byte value after that, IFD entries and pixel samples alike, follows
//! it. This module turns that marker into a handler object the reader and the
//! raster decoder can share.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian, ReadBytesExt};
use std::io::Result;

use crate::io::seekable::SeekableReader;
use crate::tiff::errors::{TiffError, TiffResult};

/// Byte order declared by a TIFF header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// "II" (Intel)
    LittleEndian,
    /// "MM" (Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Reads the two-byte marker at the current position
    pub fn detect(reader: &mut dyn SeekableReader) -> TiffResult<Self> {
        let marker = reader.read_u16::<LittleEndian>()?;
        match marker {
            0x4949 => Ok(ByteOrder::LittleEndian),
            0x4D4D => Ok(ByteOrder::BigEndian),
            _ => Err(TiffError::InvalidByteOrder(marker)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "Little Endian (II)",
            ByteOrder::BigEndian => "Big Endian (MM)",
        }
    }

    /// Creates the handler matching this byte order
    pub fn create_handler(&self) -> Box<dyn ByteOrderHandler> {
        match self {
            ByteOrder::LittleEndian => Box::new(LittleEndianHandler),
            ByteOrder::BigEndian => Box::new(BigEndianHandler),
        }
    }
}

/// Byte-order specific reads for header fields and decoded sample buffers
pub trait ByteOrderHandler: Send + Sync {
    /// The byte order this handler decodes
    fn order(&self) -> ByteOrder;

    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16>;
    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32>;
    fn read_u64(&self, reader: &mut dyn SeekableReader) -> Result<u64>;
    fn read_f64(&self, reader: &mut dyn SeekableReader) -> Result<f64>;

    /// Serializes an inline IFD value field back into its on-disk bytes
    ///
    /// Multi-value payloads that fit into the entry's 4 (or 8 for BigTIFF)
    /// byte field are stored inline, left-aligned in file order. The reader
    /// keeps that field as one file-order integer; this undoes the conversion.
    fn inline_bytes(&self, value: u64, is_big_tiff: bool) -> Vec<u8>;

    /// Encodes a single value of `size` bytes in file order
    fn scalar_bytes(&self, value: u64, size: usize) -> Vec<u8>;

    /// Decodes 16-bit words from a raw sample buffer
    fn u16_slice(&self, src: &[u8]) -> Vec<u16>;
    /// Decodes 32-bit words from a raw sample buffer
    fn u32_slice(&self, src: &[u8]) -> Vec<u32>;
    /// Decodes 64-bit words from a raw sample buffer
    fn u64_slice(&self, src: &[u8]) -> Vec<u64>;
}

/// Little-endian byte order handler
pub struct LittleEndianHandler;

impl ByteOrderHandler for LittleEndianHandler {
    fn order(&self) -> ByteOrder {
        ByteOrder::LittleEndian
    }

    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16> {
        reader.read_u16::<LittleEndian>()
    }

    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32> {
        reader.read_u32::<LittleEndian>()
    }

    fn read_u64(&self, reader: &mut dyn SeekableReader) -> Result<u64> {
        reader.read_u64::<LittleEndian>()
    }

    fn read_f64(&self, reader: &mut dyn SeekableReader) -> Result<f64> {
        reader.read_f64::<LittleEndian>()
    }

    fn inline_bytes(&self, value: u64, is_big_tiff: bool) -> Vec<u8> {
        if is_big_tiff {
            value.to_le_bytes().to_vec()
        } else {
            (value as u32).to_le_bytes().to_vec()
        }
    }

    fn scalar_bytes(&self, value: u64, size: usize) -> Vec<u8> {
        value.to_le_bytes()[..size.min(8)].to_vec()
    }

    fn u16_slice(&self, src: &[u8]) -> Vec<u16> {
        let mut out = vec![0u16; src.len() / 2];
        LittleEndian::read_u16_into(&src[..out.len() * 2], &mut out);
        out
    }

    fn u32_slice(&self, src: &[u8]) -> Vec<u32> {
        let mut out = vec![0u32; src.len() / 4];
        LittleEndian::read_u32_into(&src[..out.len() * 4], &mut out);
        out
    }

    fn u64_slice(&self, src: &[u8]) -> Vec<u64> {
        let mut out = vec![0u64; src.len() / 8];
        LittleEndian::read_u64_into(&src[..out.len() * 8], &mut out);
        out
    }
}

/// Big-endian byte order handler
pub struct BigEndianHandler;

impl ByteOrderHandler for BigEndianHandler {
    fn order(&self) -> ByteOrder {
        ByteOrder::BigEndian
    }

    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16> {
        reader.read_u16::<BigEndian>()
    }

    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32> {
        reader.read_u32::<BigEndian>()
    }

    fn read_u64(&self, reader: &mut dyn SeekableReader) -> Result<u64> {
        reader.read_u64::<BigEndian>()
    }

    fn read_f64(&self, reader: &mut dyn SeekableReader) -> Result<f64> {
        reader.read_f64::<BigEndian>()
    }

    fn inline_bytes(&self, value: u64, is_big_tiff: bool) -> Vec<u8> {
        if is_big_tiff {
            value.to_be_bytes().to_vec()
        } else {
            (value as u32).to_be_bytes().to_vec()
        }
    }

    fn scalar_bytes(&self, value: u64, size: usize) -> Vec<u8> {
        value.to_be_bytes()[8 - size.min(8)..].to_vec()
    }

    fn u16_slice(&self, src: &[u8]) -> Vec<u16> {
        let mut out = vec![0u16; src.len() / 2];
        BigEndian::read_u16_into(&src[..out.len() * 2], &mut out);
        out
    }

    fn u32_slice(&self, src: &[u8]) -> Vec<u32> {
        let mut out = vec![0u32; src.len() / 4];
        BigEndian::read_u32_into(&src[..out.len() * 4], &mut out);
        out
    }

    fn u64_slice(&self, src: &[u8]) -> Vec<u64> {
        let mut out = vec![0u64; src.len() / 8];
        BigEndian::read_u64_into(&src[..out.len() * 8], &mut out);
        out
    }
}
