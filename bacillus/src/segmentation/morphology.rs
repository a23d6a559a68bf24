//! Binary morphology with disk footprints.
//!
//! Samples outside the mask are skipped by erosion and dilation, and
//! replicated from the nearest edge pixel by the median filter.

use rayon::prelude::*;

use super::labeling::LabelMap;
use crate::Mask;

const ROWS_PER_CHUNK: usize = 8;

/// Offsets `(dx, dy)` of a structuring element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footprint {
    offsets: Vec<(isize, isize)>,
}

impl Footprint {
    /// All offsets with `dx² + dy² <= radius²`.
    pub fn disk(radius: usize) -> Self {
        let r = radius as isize;
        let offsets = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx * dx + dy * dy <= r * r)
            .collect();
        Self { offsets }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Evaluates `f(x, y)` for every pixel in parallel row chunks.
fn par_from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> bool + Sync) -> Mask {
    let mut output = vec![false; width * height];
    if width > 0 {
        output
            .par_chunks_mut(width * ROWS_PER_CHUNK)
            .enumerate()
            .for_each(|(chunk_idx, out_chunk)| {
                let y_start = chunk_idx * ROWS_PER_CHUNK;
                for (local_y, out_row) in out_chunk.chunks_mut(width).enumerate() {
                    for (x, out) in out_row.iter_mut().enumerate() {
                        *out = f(x, y_start + local_y);
                    }
                }
            });
    }
    Mask::new(width, height, output)
}

#[inline]
fn shifted(mask: &Mask, x: usize, y: usize, (dx, dy): (isize, isize)) -> Option<bool> {
    mask.get_signed(x as isize + dx, y as isize + dy).copied()
}

pub fn binary_dilation(mask: &Mask, footprint: &Footprint) -> Mask {
    par_from_fn(mask.width(), mask.height(), |x, y| {
        footprint
            .offsets
            .iter()
            .any(|&o| shifted(mask, x, y, o) == Some(true))
    })
}

pub fn binary_erosion(mask: &Mask, footprint: &Footprint) -> Mask {
    par_from_fn(mask.width(), mask.height(), |x, y| {
        footprint
            .offsets
            .iter()
            .all(|&o| shifted(mask, x, y, o) != Some(false))
    })
}

/// Erosion followed by dilation: removes features thinner than the footprint.
pub fn binary_opening(mask: &Mask, footprint: &Footprint) -> Mask {
    binary_dilation(&binary_erosion(mask, footprint), footprint)
}

/// Majority vote over the footprint, edges replicated.
pub fn binary_median(mask: &Mask, footprint: &Footprint) -> Mask {
    let (w, h) = (mask.width() as isize, mask.height() as isize);
    let half = footprint.len() / 2;
    par_from_fn(mask.width(), mask.height(), |x, y| {
        let ones = footprint
            .offsets
            .iter()
            .filter(|&&(dx, dy)| {
                let sx = (x as isize + dx).clamp(0, w - 1) as usize;
                let sy = (y as isize + dy).clamp(0, h - 1) as usize;
                mask[(sx, sy)]
            })
            .count();
        ones > half
    })
}

/// Drops four-connected foreground components with fewer than `min_size` pixels.
pub fn remove_small_objects(mask: &Mask, min_size: usize) -> Mask {
    let map = LabelMap::from_mask(mask);
    let sizes = map.component_sizes();
    map.labels()
        .map(|&l| l != 0 && sizes[l as usize] >= min_size)
}

/// Fills four-connected background components with fewer than
/// `area_threshold` pixels, including those touching the border.
pub fn remove_small_holes(mask: &Mask, area_threshold: usize) -> Mask {
    let background = mask.map(|&v| !v);
    remove_small_objects(&background, area_threshold).map(|&v| !v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: usize, from: usize, to: usize) -> Mask {
        Mask::from_fn(size, size, |x, y| (from..to).contains(&x) && (from..to).contains(&y))
    }

    #[test]
    fn test_disk_sizes() {
        assert_eq!(Footprint::disk(0).len(), 1);
        assert_eq!(Footprint::disk(1).len(), 5);
        assert_eq!(Footprint::disk(2).len(), 13);
        assert_eq!(Footprint::disk(5).len(), 81);
    }

    #[test]
    fn test_dilation_of_point_is_disk() {
        let point = Mask::from_fn(11, 11, |x, y| x == 5 && y == 5);
        let dilated = binary_dilation(&point, &Footprint::disk(2));
        assert_eq!(dilated.iter().filter(|&&v| v).count(), 13);
        assert!(dilated[(5, 3)] && dilated[(6, 6)] && !dilated[(7, 7)]);
    }

    #[test]
    fn test_erosion_ignores_outside_pixels() {
        let full = Mask::new_filled(6, 6, true);
        assert!(binary_erosion(&full, &Footprint::disk(1)).iter().all(|&v| v));
        let eroded = binary_erosion(&square(12, 3, 9), &Footprint::disk(1));
        assert_eq!(eroded.iter().filter(|&&v| v).count(), 16);
    }

    #[test]
    fn test_opening_removes_thin_spur() {
        let mut mask = square(20, 4, 14);
        for x in 14..19 {
            *mask.get_mut(x, 9) = true;
        }
        let opened = binary_opening(&mask, &Footprint::disk(2));
        assert!(!opened[(16, 9)]);
        assert!(opened[(9, 9)]);
        // a square loses its corners to a disk opening
        assert!(!opened[(4, 4)]);
        assert!(opened[(5, 5)]);
    }

    #[test]
    fn test_median_removes_isolated_pixel_and_fills_pinhole() {
        let mut mask = square(15, 2, 12);
        *mask.get_mut(7, 7) = false;
        *mask.get_mut(13, 13) = true;
        let filtered = binary_median(&mask, &Footprint::disk(2));
        assert!(filtered[(7, 7)]);
        assert!(!filtered[(13, 13)]);
    }

    #[test]
    fn test_small_objects_and_holes() {
        let mut mask = square(20, 2, 12);
        *mask.get_mut(17, 17) = true;
        *mask.get_mut(6, 6) = false;
        let cleaned = remove_small_objects(&mask, 5);
        assert!(!cleaned[(17, 17)]);
        assert!(cleaned[(2, 2)]);
        assert!(!cleaned[(6, 6)]);

        let filled = remove_small_holes(&cleaned, 5);
        assert!(filled[(6, 6)]);
        assert!(!filled[(0, 0)]);
    }
}
