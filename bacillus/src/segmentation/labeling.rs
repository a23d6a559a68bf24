//! Four-connected component labeling using union-find over row runs.
//!
//! Labels are assigned in raster order of each component's first pixel,
//! starting at 1; 0 is background.

use crate::{LabelImage, Mask};

// ============================================================================
// Run-Length Encoding
// ============================================================================

/// A horizontal run of foreground pixels.
#[derive(Debug, Clone, Copy)]
struct Run {
    start: usize, // inclusive
    end: usize,   // exclusive
    label: u32,
}

/// Four-connected runs in adjacent rows share at least one column.
#[inline]
fn runs_connected(prev: &Run, curr: &Run) -> bool {
    prev.start < curr.end && prev.end > curr.start
}

fn extract_runs(row: &[bool], runs: &mut Vec<Run>) {
    let mut start = None;
    for (x, &set) in row.iter().enumerate() {
        match (set, start) {
            (true, None) => start = Some(x),
            (false, Some(s)) => {
                runs.push(Run {
                    start: s,
                    end: x,
                    label: 0,
                });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(Run {
            start: s,
            end: row.len(),
            label: 0,
        });
    }
}

// ============================================================================
// LabelMap
// ============================================================================

/// A label image together with its component count.
#[derive(Debug, Clone)]
pub struct LabelMap {
    labels: LabelImage,
    num_labels: usize,
}

impl LabelMap {
    pub fn from_mask(mask: &Mask) -> Self {
        let (width, height) = (mask.width(), mask.height());
        let mut labels = LabelImage::new_default(width, height);
        let mut uf = UnionFind::new();
        let mut prev_runs: Vec<Run> = Vec::with_capacity(width / 4);
        let mut curr_runs: Vec<Run> = Vec::with_capacity(width / 4);

        for y in 0..height {
            curr_runs.clear();
            extract_runs(mask.row(y), &mut curr_runs);
            if curr_runs.is_empty() {
                prev_runs.clear();
                continue;
            }
            merge_runs_with_prev(&mut curr_runs, &prev_runs, &mut uf);

            let row_start = y * width;
            let pixels = labels.pixels_mut();
            for run in &curr_runs {
                pixels[row_start + run.start..row_start + run.end].fill(run.label);
            }
            std::mem::swap(&mut prev_runs, &mut curr_runs);
        }

        let num_labels = uf.flatten_labels(labels.pixels_mut());
        Self { labels, num_labels }
    }

    /// Number of connected components (excluding background).
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn labels(&self) -> &LabelImage {
        &self.labels
    }

    pub fn into_labels(self) -> LabelImage {
        self.labels
    }

    /// Pixel count of every component; index 0 counts the background.
    pub fn component_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.num_labels + 1];
        for &l in self.labels.iter() {
            sizes[l as usize] += 1;
        }
        sizes
    }
}

fn merge_runs_with_prev(curr_runs: &mut [Run], prev_runs: &[Run], uf: &mut UnionFind) {
    let mut prev_idx = 0;
    for run in curr_runs.iter_mut() {
        while prev_idx < prev_runs.len() && prev_runs[prev_idx].end <= run.start {
            prev_idx += 1;
        }

        let mut assigned_label = None;
        let mut check_idx = prev_idx;
        while check_idx < prev_runs.len() && prev_runs[check_idx].start < run.end {
            let prev_run = &prev_runs[check_idx];
            if runs_connected(prev_run, run) {
                match assigned_label {
                    Some(label) if label != prev_run.label => uf.union(label, prev_run.label),
                    None => assigned_label = Some(prev_run.label),
                    _ => {}
                }
            }
            check_idx += 1;
        }

        run.label = assigned_label.unwrap_or_else(|| uf.make_set());
    }
}

// ============================================================================
// Union-Find
// ============================================================================

#[derive(Debug)]
struct UnionFind {
    parent: Vec<u32>,
    next_label: u32,
}

impl UnionFind {
    fn new() -> Self {
        Self {
            parent: Vec::with_capacity(64),
            next_label: 1,
        }
    }

    fn make_set(&mut self) -> u32 {
        let label = self.next_label;
        self.parent.push(label);
        self.next_label += 1;
        label
    }

    /// Root of `label`, compressing the path behind it.
    fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        while self.parent[(root - 1) as usize] != root {
            root = self.parent[(root - 1) as usize];
        }
        let mut current = label;
        while current != root {
            let next = self.parent[(current - 1) as usize];
            self.parent[(current - 1) as usize] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (smaller, larger) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[(larger - 1) as usize] = smaller;
        }
    }

    /// Rewrites provisional labels to sequential `1..=n`, returning `n`.
    fn flatten_labels(&mut self, labels: &mut [u32]) -> usize {
        if self.parent.is_empty() {
            return 0;
        }
        let len = self.parent.len();
        let mut label_map = vec![0u32; len + 1];
        let mut num_labels = 0u32;
        for i in 1..=len as u32 {
            let root = self.find(i);
            if label_map[root as usize] == 0 {
                num_labels += 1;
                label_map[root as usize] = num_labels;
            }
            label_map[i as usize] = label_map[root as usize];
        }
        for l in labels.iter_mut() {
            if *l != 0 {
                *l = label_map[*l as usize];
            }
        }
        num_labels as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> Mask {
        let height = rows.len();
        let width = rows[0].len();
        Mask::from_fn(width, height, |x, y| rows[y].as_bytes()[x] == b'#')
    }

    #[test]
    fn test_empty_mask_has_no_labels() {
        let map = LabelMap::from_mask(&Mask::new_default(8, 5));
        assert_eq!(map.num_labels(), 0);
        assert!(map.labels().iter().all(|&l| l == 0));
    }

    #[test]
    fn test_diagonal_pixels_are_separate() {
        let map = LabelMap::from_mask(&mask_from(&["#.", ".#"]));
        assert_eq!(map.num_labels(), 2);
        assert_eq!(map.labels().pixels(), &[1, 0, 0, 2]);
    }

    #[test]
    fn test_u_shape_merges_into_one_label() {
        let map = LabelMap::from_mask(&mask_from(&[
            "#...#", //
            "#...#", //
            "#####",
        ]));
        assert_eq!(map.num_labels(), 1);
        assert!(map.labels().iter().all(|&l| l <= 1));
        assert_eq!(map.component_sizes(), vec![6, 9]);
    }

    #[test]
    fn test_labels_follow_raster_order() {
        let map = LabelMap::from_mask(&mask_from(&[
            "....#", //
            "##..#", //
            "##...",
            "...##",
        ]));
        assert_eq!(map.num_labels(), 3);
        let labels = map.labels();
        assert_eq!(labels[(4, 0)], 1);
        assert_eq!(labels[(0, 1)], 2);
        assert_eq!(labels[(3, 3)], 3);
    }

    #[test]
    fn test_staircase_chain_of_unions() {
        // three runs that only join through the last row
        let map = LabelMap::from_mask(&mask_from(&[
            "#.#.#", //
            "#.#.#", //
            "#####",
        ]));
        assert_eq!(map.num_labels(), 1);
    }
}
