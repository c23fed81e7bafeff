//! Parsed TIFF container

use crate::tiff::ifd::IFD;
use std::fmt;

/// A parsed TIFF file: its IFD chain and container flavour
#[derive(Debug)]
pub struct TIFF {
    pub ifds: Vec<IFD>,
    pub is_big_tiff: bool,
}

impl TIFF {
    pub fn new(is_big_tiff: bool) -> Self {
        TIFF {
            ifds: Vec::new(),
            is_big_tiff,
        }
    }

    /// Full-resolution image directory
    ///
    /// Overviews and masks are flagged through NewSubfileType; the first IFD
    /// without any of those bits is the primary image.
    pub fn main_ifd(&self) -> Option<&IFD> {
        self.ifds.iter()
            .find(|ifd| ifd.get_tag_value(crate::tiff::constants::tags::NEW_SUBFILE_TYPE).unwrap_or(0) == 0)
            .or_else(|| self.ifds.first())
    }

    pub fn ifd_count(&self) -> usize {
        self.ifds.len()
    }
}

impl fmt::Display for TIFF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TIFF File:")?;
        writeln!(f, "  Format: {}", if self.is_big_tiff { "BigTIFF" } else { "TIFF" })?;
        writeln!(f, "  Number of IFDs: {}", self.ifds.len())?;

        if let Some(ifd) = self.main_ifd() {
            write!(f, "{}", ifd)?;
        }

        Ok(())
    }
}
