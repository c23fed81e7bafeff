//! Tag builders used by `TiffBuilder`, grouped by concern

pub mod basic_tags;
pub mod geo_tags;
pub mod metadata_tags;
pub mod writer;
