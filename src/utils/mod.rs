//! Utility modules shared across the crate

pub mod logger;
pub mod progress;
pub(crate) mod string_utils;
pub(crate) mod tag_utils;
pub(crate) mod tiff_utils;
pub(crate) mod write_utils;
