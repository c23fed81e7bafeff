//! Seekable reader trait
//!
//! The TIFF reader jumps between the header, the IFD chain and the strip or
//! tile payloads, so every reader it is handed must support both reading and
//! seeking.

use std::io::{Read, Seek};

/// Reader that can both read and seek
pub trait SeekableReader: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> SeekableReader for T {}
