//! Zhang–Suen thinning to a one-pixel-wide, eight-connected skeleton.

use crate::Mask;

/// `P2..P9`: north first, then clockwise.
const RING: [(isize, isize); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Thins `mask` until no pixel can be removed. Pixels outside the mask are
/// background.
pub fn skeletonize(mask: &Mask) -> Mask {
    let mut skeleton = mask.clone();
    let mut removals: Vec<usize> = Vec::new();
    loop {
        let mut changed = false;
        for first_pass in [true, false] {
            removals.clear();
            for y in 0..skeleton.height() {
                for x in 0..skeleton.width() {
                    if skeleton[(x, y)] && removable(&skeleton, x, y, first_pass) {
                        removals.push(skeleton.index(x, y));
                    }
                }
            }
            changed |= !removals.is_empty();
            let pixels = skeleton.pixels_mut();
            for &i in &removals {
                pixels[i] = false;
            }
        }
        if !changed {
            return skeleton;
        }
    }
}

fn removable(mask: &Mask, x: usize, y: usize, first_pass: bool) -> bool {
    let p: [bool; 8] = RING.map(|(dx, dy)| {
        mask.get_signed(x as isize + dx, y as isize + dy)
            .copied()
            .unwrap_or(false)
    });
    let neighbors = p.iter().filter(|&&v| v).count();
    if !(2..=6).contains(&neighbors) {
        return false;
    }
    let transitions = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
    if transitions != 1 {
        return false;
    }
    // p[0] = P2 (north), p[2] = P4 (east), p[4] = P6 (south), p[6] = P8 (west)
    if first_pass {
        !(p[0] && p[2] && p[4]) && !(p[2] && p[4] && p[6])
    } else {
        !(p[0] && p[2] && p[6]) && !(p[0] && p[4] && p[6])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(mask: &Mask) -> usize {
        mask.iter().filter(|&&v| v).count()
    }

    #[test]
    fn test_bar_thins_to_line() {
        let bar = Mask::from_fn(30, 11, |x, y| (3..27).contains(&x) && (3..8).contains(&y));
        let skeleton = skeletonize(&bar);
        // every remaining pixel lies on the middle row
        for y in 0..11 {
            for x in 0..30 {
                if skeleton[(x, y)] {
                    assert_eq!(y, 5, "pixel ({}, {})", x, y);
                }
            }
        }
        assert!(count(&skeleton) >= 18);
    }

    #[test]
    fn test_line_is_stable() {
        let line = Mask::from_fn(20, 5, |x, y| y == 2 && (2..18).contains(&x));
        assert_eq!(skeletonize(&line), line);
    }

    #[test]
    fn test_empty_mask() {
        let empty = Mask::new_default(6, 6);
        assert_eq!(skeletonize(&empty), empty);
    }
}
