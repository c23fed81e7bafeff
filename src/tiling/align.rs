//! Nearest-neighbour alignment onto a target pixel grid

use log::debug;

use crate::raster::grid::RasterGrid;

/// Source index sampled by each of `target` output positions
///
/// Output pixel `i` takes the source pixel under its centre:
/// `floor((2i + 1) * src / (2 * target))`, clamped to the last source pixel.
pub fn nearest_indices(src: usize, target: usize) -> Vec<usize> {
    if src == 0 {
        return Vec::new();
    }
    (0..target)
        .map(|i| ((2 * i + 1) * src / (2 * target)).min(src - 1))
        .collect()
}

/// Resamples `grid` to `target_height` x `target_width`
///
/// Band count and sample type are kept. A grid that already has the target
/// size is returned unchanged.
pub fn align(grid: RasterGrid, target_height: usize, target_width: usize) -> RasterGrid {
    let (height, width, bands) = grid.shape();
    if height == target_height && width == target_width {
        return grid;
    }

    debug!("Resampling {}x{}x{} grid to {}x{}", height, width, bands, target_height, target_width);
    let rows = nearest_indices(height, target_height);
    let cols = nearest_indices(width, target_width);
    grid.select(&rows, &cols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::grid::{GridData, SampleType};
    use ndarray::Array3;

    #[test]
    fn test_upsample_doubles_pixels() {
        assert_eq!(nearest_indices(2, 4), vec![0, 0, 1, 1]);
        assert_eq!(nearest_indices(256, 512)[511], 255);

        let grid: RasterGrid = Array3::from_shape_fn((2, 2, 4), |(y, x, b)| (y * 2 + x) as f32 + b as f32 * 0.5).into();
        let up = align(grid, 4, 4);
        assert_eq!(up.shape(), (4, 4, 4));
        assert_eq!(up.sample_type(), SampleType::F32);
        match up.data() {
            GridData::F32(a) => {
                assert_eq!(a[[0, 1, 0]], 0.0);
                assert_eq!(a[[1, 2, 0]], 1.0);
                assert_eq!(a[[3, 3, 3]], 4.5);
            }
            other => panic!("unexpected variant {:?}", other),
        }
    }

    #[test]
    fn test_downsample_takes_centre_pixels() {
        assert_eq!(nearest_indices(4, 2), vec![1, 3]);
        assert_eq!(nearest_indices(3, 3), vec![0, 1, 2]);
        assert_eq!(nearest_indices(5, 2), vec![1, 3]);
    }

    #[test]
    fn test_non_integer_ratio_stays_in_range() {
        for (src, target) in [(3, 7), (7, 3), (256, 300), (1, 5)] {
            let idx = nearest_indices(src, target);
            assert_eq!(idx.len(), target);
            assert!(idx.iter().all(|&i| i < src));
            assert!(idx.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_matching_size_is_identity() {
        let grid: RasterGrid = Array3::from_shape_fn((3, 5, 1), |(y, x, _)| (y * 5 + x) as u8).into();
        assert_eq!(align(grid.clone(), 3, 5), grid);
    }

    #[test]
    fn test_anisotropic_alignment() {
        let grid: RasterGrid = Array3::from_shape_fn((2, 3, 1), |(y, x, _)| (y * 3 + x) as u16).into();
        let aligned = align(grid, 4, 3);
        assert_eq!(aligned.shape(), (4, 3, 1));
        match aligned.data() {
            GridData::U16(a) => {
                assert_eq!(a[[1, 2, 0]], 2);
                assert_eq!(a[[2, 0, 0]], 3);
            }
            other => panic!("unexpected variant {:?}", other),
        }
    }
}
