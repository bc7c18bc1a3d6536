//! Utility functions and types used accross the library
use std::ops::Range;

/// Restrict value to a certain interval
#[inline]
pub fn clamp<T>(val: T, min: T, max: T) -> T
where
    T: PartialOrd,
{
    if val < min {
        min
    } else if val > max {
        max
    } else {
        val
    }
}

/// Range of pixel indices spanned by `[low, high]` sub-pixel units, restricted to `0..limit`
///
/// Pixels touching the interval only at its boundary are included.
pub(crate) fn pixel_span(low: i64, high: i64, units: i64, limit: usize) -> Range<usize> {
    let start = low.div_euclid(units).max(0);
    let end = (high.div_euclid(units) + 1).clamp(0, limit as i64);
    if start >= end {
        return 0..0;
    }
    start as usize..end as usize
}

/// Grow set pixels of a row-major mask by `radius` pixels in every direction (chebyshev distance)
pub(crate) fn dilate(mask: &[bool], width: usize, height: usize, radius: usize) -> Vec<bool> {
    if radius == 0 {
        return mask.to_vec();
    }
    // separable: horizontal pass followed by vertical pass
    let mut horizontal = vec![false; mask.len()];
    for row in 0..height {
        let line = &mask[row * width..(row + 1) * width];
        for (col, set) in line.iter().enumerate() {
            if !set {
                continue;
            }
            let low = col.saturating_sub(radius);
            let high = (col + radius + 1).min(width);
            horizontal[row * width + low..row * width + high].fill(true);
        }
    }
    let mut result = vec![false; mask.len()];
    for row in 0..height {
        let low = row.saturating_sub(radius);
        let high = (row + radius + 1).min(height);
        for col in 0..width {
            if horizontal[row * width + col] {
                for other in low..high {
                    result[other * width + col] = true;
                }
            }
        }
    }
    result
}
