//! TIFF file reader
//!
//! Parses the header and IFD chain of TIFF and BigTIFF files in either byte
//! order, and resolves tag payloads (inline or stored at an offset) into
//! typed values for the raster decoder and the georeference loader.

use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufReader, Read, SeekFrom};
use std::path::{Path, PathBuf};

use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::io::seekable::SeekableReader;
use crate::tiff::constants::{field_types, header};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::{IFDEntry, IFD};
use crate::tiff::types::TIFF;
use crate::tiff::validation;
use crate::utils::logger::Logger;
use crate::utils::string_utils;

/// Upper bound on the IFD chain length, guards against offset loops
const MAX_IFDS: usize = 100;

/// Reader for TIFF and BigTIFF files
pub struct TiffReader<'a> {
    /// Handler for the byte order of the current file
    pub(crate) byte_order_handler: Option<Box<dyn ByteOrderHandler>>,
    logger: &'a Logger,
    current_file: Option<PathBuf>,
    pub(crate) is_big_tiff: bool,
}

impl<'a> TiffReader<'a> {
    pub fn new(logger: &'a Logger) -> Self {
        TiffReader {
            byte_order_handler: None,
            logger,
            current_file: None,
            is_big_tiff: false,
        }
    }

    /// Opens a fresh handle on the file most recently passed to `load`
    pub fn create_reader(&self) -> TiffResult<BufReader<File>> {
        match &self.current_file {
            Some(path) => Ok(BufReader::with_capacity(1024 * 1024, File::open(path)?)),
            None => Err(TiffError::GenericError("No file path specified".to_string())),
        }
    }

    /// Byte order handler of the current file
    pub fn handler(&self) -> TiffResult<&dyn ByteOrderHandler> {
        self.byte_order_handler.as_deref()
            .ok_or_else(|| TiffError::GenericError("Byte order not yet determined".to_string()))
    }

    /// Loads the header and IFD chain of a TIFF file
    pub fn load(&mut self, path: &Path) -> TiffResult<TIFF> {
        info!("Loading TIFF file: {}", path.display());
        self.logger.log(&format!("Reading TIFF structure of {}", path.display()))?;
        self.current_file = Some(path.to_path_buf());

        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(1024 * 1024, file);

        self.read(&mut reader)
    }

    /// Reads the header and IFD chain from any seekable reader
    pub fn read(&mut self, reader: &mut dyn SeekableReader) -> TiffResult<TIFF> {
        let byte_order = ByteOrder::detect(reader)?;
        debug!("Detected byte order: {}", byte_order.name());
        self.byte_order_handler = Some(byte_order.create_handler());

        self.is_big_tiff = self.detect_tiff_format(reader)?;
        let mut tiff = TIFF::new(self.is_big_tiff);

        let first_ifd_offset = self.read_offset(reader)?;
        debug!("First IFD offset: {}", first_ifd_offset);

        let file_size = validation::get_file_size(reader)?;
        validation::validate_ifd_offset(first_ifd_offset, file_size)?;

        tiff.ifds = self.read_ifd_chain(reader, first_ifd_offset, file_size)?;

        info!("Read {} IFDs from TIFF file", tiff.ifds.len());
        Ok(tiff)
    }

    /// Reads the version word and validates the BigTIFF extension header
    fn detect_tiff_format(&self, reader: &mut dyn SeekableReader) -> TiffResult<bool> {
        let handler = self.handler()?;
        let version = handler.read_u16(reader)?;

        match version {
            header::BIG_TIFF_VERSION => {
                debug!("Detected BigTIFF format");
                validation::validate_bigtiff_header(reader, handler)?;
                Ok(true)
            },
            header::TIFF_VERSION => {
                debug!("Detected standard TIFF format");
                Ok(false)
            },
            _ => Err(TiffError::UnsupportedVersion(version)),
        }
    }

    /// Reads a 4-byte (8-byte for BigTIFF) offset
    fn read_offset(&self, reader: &mut dyn SeekableReader) -> TiffResult<u64> {
        let handler = self.handler()?;
        if self.is_big_tiff {
            Ok(handler.read_u64(reader)?)
        } else {
            Ok(handler.read_u32(reader)? as u64)
        }
    }

    fn read_ifd_chain(&self, reader: &mut dyn SeekableReader, first_ifd_offset: u64, file_size: u64) -> TiffResult<Vec<IFD>> {
        let mut ifds = Vec::new();
        let mut ifd_offset = first_ifd_offset;

        while ifd_offset != 0 && ifds.len() < MAX_IFDS {
            if ifd_offset >= file_size {
                warn!("IFD offset {} exceeds file size {}, stopping IFD chain", ifd_offset, file_size);
                break;
            }

            let ifd = match self.read_ifd(reader, ifd_offset, ifds.len()) {
                Ok(ifd) => ifd,
                Err(e) => {
                    // The primary image is unusable without its directory
                    if ifds.is_empty() {
                        return Err(e);
                    }
                    warn!("Error reading IFD {}: {}", ifds.len(), e);
                    break;
                }
            };

            // read_ifd leaves the reader right after the last entry
            let next_ifd_offset = match self.read_offset(reader) {
                Ok(offset) => offset,
                Err(e) => {
                    warn!("Error reading next IFD offset: {}", e);
                    ifds.push(ifd);
                    break;
                }
            };

            ifds.push(ifd);

            if next_ifd_offset != 0 && (next_ifd_offset >= file_size || next_ifd_offset < 8) {
                warn!("Invalid next IFD offset: {}, stopping IFD chain", next_ifd_offset);
                break;
            }
            ifd_offset = next_ifd_offset;
        }

        Ok(ifds)
    }

    /// Reads one IFD located at `offset`
    pub fn read_ifd(&self, reader: &mut dyn SeekableReader, offset: u64, number: usize) -> TiffResult<IFD> {
        reader.seek(SeekFrom::Start(offset))?;
        let handler = self.handler()?;

        let entry_count = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u16(reader)? as u64
        };
        debug!("IFD #{} at {} has {} entries", number, offset, entry_count);

        let field_len = if self.is_big_tiff { 8 } else { 4 };
        let mut ifd = IFD::new(number, offset);
        for _ in 0..entry_count {
            let tag = handler.read_u16(reader)?;
            let field_type = handler.read_u16(reader)?;
            let count = self.read_offset(reader)?;

            let mut field = [0u8; 8];
            reader.read_exact(&mut field[..field_len])?;

            let mut entry = IFDEntry::new(tag, field_type, count, 0);
            entry.value_offset = self.decode_value_field(handler, &entry, &field[..field_len]);
            ifd.add_entry(entry);
        }

        Ok(ifd)
    }

    /// Interprets the value field of an entry
    ///
    /// A single inline value is decoded at its own width, so SHORT tags read
    /// correctly from big-endian files. Anything else keeps the whole field
    /// as one integer in file order (an offset, or packed inline values).
    fn decode_value_field(&self, handler: &dyn ByteOrderHandler, entry: &IFDEntry, field: &[u8]) -> u64 {
        let size = entry.get_field_type_size();
        if entry.count == 1 && entry.is_value_inline(self.is_big_tiff) {
            return match size {
                1 => field[0] as u64,
                2 => handler.u16_slice(&field[..2])[0] as u64,
                4 => handler.u32_slice(&field[..4])[0] as u64,
                _ => handler.u64_slice(&field[..8])[0],
            };
        }

        if field.len() == 8 {
            handler.u64_slice(field)[0]
        } else {
            handler.u32_slice(field)[0] as u64
        }
    }

    /// Raw payload bytes of a tag, in file byte order
    pub fn read_tag_bytes(&self, reader: &mut dyn SeekableReader, entry: &IFDEntry) -> TiffResult<Vec<u8>> {
        let size = entry.data_size();
        let handler = self.handler()?;

        if entry.is_value_inline(self.is_big_tiff) {
            if entry.count == 1 {
                return Ok(handler.scalar_bytes(entry.value_offset, size));
            }
            let mut bytes = handler.inline_bytes(entry.value_offset, self.is_big_tiff);
            bytes.truncate(size);
            return Ok(bytes);
        }

        let file_size = validation::get_file_size(reader)?;
        validation::validate_chunk_extent(entry.value_offset, size as u64, file_size)?;
        reader.seek(SeekFrom::Start(entry.value_offset))?;
        let mut bytes = vec![0u8; size];
        reader.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads an integer-typed tag as a vector of u64
    ///
    /// Used for strip/tile offsets and byte counts, BitsPerSample and the
    /// other per-sample tags whose payload may be inline or external.
    pub fn read_tag_values(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<Vec<u64>> {
        let entry = ifd.get_entry(tag)
            .ok_or(TiffError::TagNotFound(tag))?;
        let bytes = self.read_tag_bytes(reader, entry)?;
        let handler = self.handler()?;

        let values = match entry.field_type {
            field_types::BYTE | field_types::SBYTE | field_types::UNDEFINED => {
                bytes.iter().map(|&b| b as u64).collect()
            },
            field_types::SHORT | field_types::SSHORT => {
                handler.u16_slice(&bytes).into_iter().map(u64::from).collect()
            },
            field_types::LONG | field_types::SLONG => {
                handler.u32_slice(&bytes).into_iter().map(u64::from).collect()
            },
            field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => {
                handler.u64_slice(&bytes)
            },
            other => return Err(TiffError::UnsupportedFieldType(other)),
        };

        Ok(values)
    }

    /// Reads a DOUBLE-typed tag (ModelPixelScale, ModelTiepoint, GeoDoubleParams)
    pub fn read_f64_values(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<Vec<f64>> {
        let entry = ifd.get_entry(tag)
            .ok_or(TiffError::TagNotFound(tag))?;
        if entry.field_type != field_types::DOUBLE {
            return Err(TiffError::UnsupportedFieldType(entry.field_type));
        }

        let bytes = self.read_tag_bytes(reader, entry)?;
        Ok(self.handler()?
            .u64_slice(&bytes)
            .into_iter()
            .map(f64::from_bits)
            .collect())
    }

    /// Reads an ASCII tag, trailing NULs removed
    pub fn read_ascii(&self, reader: &mut dyn SeekableReader, ifd: &IFD, tag: u16) -> TiffResult<String> {
        let entry = ifd.get_entry(tag)
            .ok_or(TiffError::TagNotFound(tag))?;
        let mut bytes = self.read_tag_bytes(reader, entry)?;
        string_utils::trim_trailing_nulls(&mut bytes);

        String::from_utf8(bytes)
            .map_err(|e| TiffError::GenericError(format!("Invalid UTF-8 string: {}", e)))
    }

    pub fn is_big_tiff(&self) -> bool {
        self.is_big_tiff
    }
}
