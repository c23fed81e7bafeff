//! Low-level I/O helpers shared by the TIFF reader and the raster decoder
//!
//! Everything here is byte-order aware so the higher layers never have to
//! care whether a source was written on an Intel or a Motorola machine.

pub mod seekable;
pub mod byte_order;
