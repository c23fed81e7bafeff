//! Per-band rescaling of tiles to 8-bit samples

use ndarray::{Array3, Axis, Zip};
use num_traits::AsPrimitive;

use crate::raster::grid::{with_grid, RasterGrid};

/// Observed sample range of one band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandRange {
    pub min: f64,
    pub max: f64,
}

impl BandRange {
    /// A band without dynamic range, or without any finite-comparable sample
    pub fn is_flat(&self) -> bool {
        !(self.max > self.min)
    }

    /// Maps `value` into 0..=255
    ///
    /// NaN samples and every sample of a flat band map to 0. Infinities lie
    /// outside the observed range and saturate: +inf to 255, -inf to 0.
    pub fn scale(&self, value: f64) -> u8 {
        if self.is_flat() || value.is_nan() {
            return 0;
        }
        let scaled = (value - self.min) * 255.0 / (self.max - self.min);
        scaled.round().clamp(0.0, 255.0) as u8
    }
}

/// Min and max of each band, ignoring NaN and infinite samples
fn band_ranges<T>(array: &Array3<T>) -> Vec<BandRange>
where
    T: AsPrimitive<f64>,
{
    array.axis_iter(Axis(2))
        .map(|band| {
            band.iter().fold(BandRange { min: f64::NAN, max: f64::NAN }, |range, &v| {
                let v: f64 = v.as_();
                if !v.is_finite() {
                    range
                } else {
                    BandRange { min: range.min.min(v), max: range.max.max(v) }
                }
            })
        })
        .collect()
}

fn rescale<T>(array: &Array3<T>) -> (Array3<u8>, Vec<BandRange>)
where
    T: AsPrimitive<f64>,
{
    let ranges = band_ranges(array);
    let mut out = Array3::<u8>::zeros(array.dim());

    for ((mut dst, src), range) in out.axis_iter_mut(Axis(2))
        .zip(array.axis_iter(Axis(2)))
        .zip(&ranges)
    {
        Zip::from(&mut dst).and(&src).for_each(|d, &s| *d = range.scale(s.as_()));
    }

    (out, ranges)
}

/// Rescales every band of `grid` to the full 0..=255 range
///
/// The band minimum maps to 0 and its maximum to 255. Returns the 8-bit
/// grid together with the source range of each band.
pub fn normalize(grid: &RasterGrid) -> (RasterGrid, Vec<BandRange>) {
    let (array, ranges) = with_grid!(grid.data(), a => rescale(a));
    (RasterGrid::from(array), ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_min_and_max_reach_the_ends() {
        let grid: RasterGrid = Array3::from_shape_vec((2, 2, 1), vec![100u16, 200, 300, 1100]).unwrap().into();
        let (out, ranges) = normalize(&grid);
        let a = out.as_u8().unwrap();

        assert_eq!(ranges, vec![BandRange { min: 100.0, max: 1100.0 }]);
        assert_eq!(a[[0, 0, 0]], 0);
        assert_eq!(a[[0, 1, 0]], 26);
        assert_eq!(a[[1, 0, 0]], 51);
        assert_eq!(a[[1, 1, 0]], 255);
    }

    #[test]
    fn test_bands_are_scaled_independently() {
        let grid: RasterGrid = array![[[0i16, -50], [10, 50]]].into();
        let (out, ranges) = normalize(&grid);
        let a = out.as_u8().unwrap();

        assert_eq!(ranges[1], BandRange { min: -50.0, max: 50.0 });
        assert_eq!((a[[0, 0, 0]], a[[0, 1, 0]]), (0, 255));
        assert_eq!((a[[0, 0, 1]], a[[0, 1, 1]]), (0, 255));
    }

    #[test]
    fn test_flat_band_maps_to_zero() {
        let grid: RasterGrid = Array3::from_elem((3, 3, 2), 42u8).into();
        let (out, ranges) = normalize(&grid);
        assert!(ranges.iter().all(|r| r.is_flat()));
        assert!(out.as_u8().unwrap().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_nan_samples_are_ignored() {
        let grid: RasterGrid = Array3::from_shape_vec((1, 4, 1), vec![f32::NAN, 1.0, 3.0, f32::NAN]).unwrap().into();
        let (out, ranges) = normalize(&grid);
        assert_eq!(ranges, vec![BandRange { min: 1.0, max: 3.0 }]);
        assert_eq!(out.as_u8().unwrap().iter().copied().collect::<Vec<_>>(), vec![0, 0, 255, 0]);

        let all_nan: RasterGrid = Array3::from_elem((2, 2, 1), f64::NAN).into();
        let (out, ranges) = normalize(&all_nan);
        assert!(ranges[0].is_flat());
        assert!(out.as_u8().unwrap().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_infinite_samples_saturate() {
        let values = vec![2.0f32, f32::INFINITY, 4.0, f32::NEG_INFINITY, 6.0];
        let grid: RasterGrid = Array3::from_shape_vec((1, 5, 1), values).unwrap().into();
        let (out, ranges) = normalize(&grid);

        assert_eq!(ranges, vec![BandRange { min: 2.0, max: 6.0 }]);
        assert_eq!(out.as_u8().unwrap().iter().copied().collect::<Vec<_>>(), vec![0, 255, 128, 0, 255]);
    }

    #[test]
    fn test_output_covers_full_range_for_wide_types() {
        let values: Vec<u32> = (0..64).map(|i| i * 1_000_000).collect();
        let grid: RasterGrid = Array3::from_shape_vec((8, 8, 1), values).unwrap().into();
        let (out, _) = normalize(&grid);
        let a = out.as_u8().unwrap();
        assert_eq!(a.iter().min(), Some(&0));
        assert_eq!(a.iter().max(), Some(&255));
    }
}
