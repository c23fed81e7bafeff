//! Outcome of a tiling run

use std::fmt;

use crate::tiling::extract::Role;
use crate::tiling::indexer::TileBox;

/// One file that could not be written
#[derive(Debug, Clone, PartialEq)]
pub struct TileFailure {
    pub identifier: String,
    pub tile: TileBox,
    pub role: Role,
    pub message: String,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Boxes in the tile plan
    pub planned: usize,
    /// Boxes processed before completion or cancellation
    pub attempted: usize,
    /// Boxes whose three files were all written
    pub exported: usize,
    /// Boxes with at least one file missing
    pub failed: usize,
    pub files_written: usize,
    pub cancelled: bool,
    pub failures: Vec<TileFailure>,
}

impl RunSummary {
    pub fn new(planned: usize) -> Self {
        RunSummary { planned, ..Default::default() }
    }

    /// Records one processed box
    pub fn record(&mut self, files_written: usize, failures: Vec<TileFailure>) {
        self.attempted += 1;
        self.files_written += files_written;
        if failures.is_empty() {
            self.exported += 1;
        } else {
            self.failed += 1;
            self.failures.extend(failures);
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.attempted == self.planned
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tiles planned:   {}", self.planned)?;
        writeln!(f, "Tiles attempted: {}", self.attempted)?;
        writeln!(f, "Tiles exported:  {}", self.exported)?;
        writeln!(f, "Tiles failed:    {}", self.failed)?;
        write!(f, "Files written:   {}", self.files_written)?;
        if self.cancelled {
            write!(f, "\nRun cancelled after {} of {} tiles", self.attempted, self.planned)?;
        }
        for failure in &self.failures {
            write!(f, "\n  {} {} {}: {}", failure.role, failure.identifier, failure.tile, failure.message)?;
        }
        Ok(())
    }
}
