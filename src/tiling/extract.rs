//! Aligned raster triplets and the tiles cut from them

use std::fmt;

use crate::pipeline::errors::{PipelineError, PipelineResult};
use crate::raster::grid::RasterGrid;
use crate::tiling::indexer::TileBox;

/// Role of a raster within a triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Low-resolution multi-band source
    Multispectral,
    /// High-resolution single-band source
    Panchromatic,
    /// Reference product already fused at panchromatic resolution
    Pansharpened,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Multispectral, Role::Panchromatic, Role::Pansharpened];

    /// Prefix of role directories and tile file names
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::Multispectral => "MS",
            Role::Panchromatic => "P",
            Role::Pansharpened => "PAN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Three grids sharing one pixel grid, each with its own band count
#[derive(Debug, Clone)]
pub struct AlignedTriplet {
    multispectral: RasterGrid,
    panchromatic: RasterGrid,
    pansharpened: RasterGrid,
}

impl AlignedTriplet {
    /// Rejects grids whose height or width differ
    pub fn new(multispectral: RasterGrid, panchromatic: RasterGrid, pansharpened: RasterGrid) -> PipelineResult<Self> {
        let dims = (panchromatic.height(), panchromatic.width());
        for (role, grid) in [(Role::Multispectral, &multispectral), (Role::Pansharpened, &pansharpened)] {
            if (grid.height(), grid.width()) != dims {
                return Err(PipelineError::InvalidState {
                    expected: format!("{} grid of {}x{}", role, dims.1, dims.0),
                    actual: format!("{}x{}", grid.width(), grid.height()),
                });
            }
        }

        Ok(AlignedTriplet { multispectral, panchromatic, pansharpened })
    }

    pub fn height(&self) -> usize {
        self.panchromatic.height()
    }

    pub fn width(&self) -> usize {
        self.panchromatic.width()
    }

    pub fn grid(&self, role: Role) -> &RasterGrid {
        match role {
            Role::Multispectral => &self.multispectral,
            Role::Panchromatic => &self.panchromatic,
            Role::Pansharpened => &self.pansharpened,
        }
    }

    /// Band counts in `Role::ALL` order
    pub fn band_counts(&self) -> [usize; 3] {
        Role::ALL.map(|role| self.grid(role).bands())
    }
}

/// The three crops of one tile box
#[derive(Debug, Clone)]
pub struct TileTriplet {
    pub tile: TileBox,
    pub multispectral: RasterGrid,
    pub panchromatic: RasterGrid,
    pub pansharpened: RasterGrid,
}

impl TileTriplet {
    pub fn grid(&self, role: Role) -> &RasterGrid {
        match role {
            Role::Multispectral => &self.multispectral,
            Role::Panchromatic => &self.panchromatic,
            Role::Pansharpened => &self.pansharpened,
        }
    }
}

/// Cuts tile boxes out of an aligned triplet
pub struct TileExtractor<'a> {
    aligned: &'a AlignedTriplet,
}

impl<'a> TileExtractor<'a> {
    pub fn new(aligned: &'a AlignedTriplet) -> Self {
        TileExtractor { aligned }
    }

    /// Crops `tile` from all three grids
    pub fn extract(&self, tile: &TileBox) -> PipelineResult<TileTriplet> {
        let crop = |role: Role| {
            let grid = self.aligned.grid(role);
            if !tile.fits(grid.height(), grid.width()) {
                return Err(PipelineError::Bounds { tile: *tile, height: grid.height(), width: grid.width() });
            }
            Ok(grid.crop(tile.x0, tile.y0, tile.x1, tile.y1))
        };

        Ok(TileTriplet {
            tile: *tile,
            multispectral: crop(Role::Multispectral)?,
            panchromatic: crop(Role::Panchromatic)?,
            pansharpened: crop(Role::Pansharpened)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn triplet(h: usize, w: usize) -> AlignedTriplet {
        AlignedTriplet::new(
            Array3::<u16>::from_shape_fn((h, w, 4), |(y, x, b)| (y * w + x + b) as u16).into(),
            Array3::<u8>::zeros((h, w, 1)).into(),
            Array3::<f32>::ones((h, w, 3)).into(),
        ).unwrap()
    }

    #[test]
    fn test_tiles_share_dimensions_not_bands() {
        let aligned = triplet(8, 8);
        assert_eq!(aligned.band_counts(), [4, 1, 3]);

        let tiles = TileExtractor::new(&aligned).extract(&TileBox::new(4, 0, 8, 4)).unwrap();
        for role in Role::ALL {
            let grid = tiles.grid(role);
            assert_eq!((grid.height(), grid.width()), (4, 4), "{}", role);
        }
        assert_eq!(tiles.multispectral.bands(), 4);
        assert_eq!(tiles.panchromatic.bands(), 1);
        assert_eq!(tiles.pansharpened.bands(), 3);
    }

    #[test]
    fn test_out_of_bounds_box() {
        let aligned = triplet(8, 8);
        let result = TileExtractor::new(&aligned).extract(&TileBox::new(4, 4, 12, 8));
        assert!(matches!(result, Err(PipelineError::Bounds { height: 8, width: 8, .. })));
    }

    #[test]
    fn test_mismatched_grids_are_rejected() {
        let result = AlignedTriplet::new(
            Array3::<u8>::zeros((4, 4, 4)).into(),
            Array3::<u8>::zeros((8, 8, 1)).into(),
            Array3::<u8>::zeros((8, 8, 3)).into(),
        );
        assert!(matches!(result, Err(PipelineError::InvalidState { .. })));
    }

    #[test]
    fn test_role_prefixes() {
        let prefixes: Vec<&str> = Role::ALL.iter().map(|r| r.prefix()).collect();
        assert_eq!(prefixes, vec!["MS", "P", "PAN"]);
    }
}
