//! Per-component geometry: bounding boxes, moments and orientation.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use glam::DVec2;

use super::labeling::LabelMap;
use crate::{LabelImage, Mask};

/// Row/column bounds; the maxima are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

impl BoundingBox {
    pub fn width(&self) -> usize {
        self.max_col - self.min_col
    }

    pub fn height(&self) -> usize {
        self.max_row - self.min_row
    }
}

/// Pads `bbox` by `edge_width` on every side, clamped to `[0, dim - 1]`.
pub fn optimize_bbox(width: usize, height: usize, bbox: BoundingBox, edge_width: usize) -> BoundingBox {
    BoundingBox {
        min_row: bbox.min_row.saturating_sub(edge_width),
        min_col: bbox.min_col.saturating_sub(edge_width),
        max_row: (bbox.max_row + edge_width).min(height.saturating_sub(1)),
        max_col: (bbox.max_col + edge_width).min(width.saturating_sub(1)),
    }
}

/// True when any side of `bbox` lies within `margin` pixels of the frame border.
pub fn touching_edge(width: usize, height: usize, bbox: BoundingBox, margin: usize) -> bool {
    let gaps = [
        bbox.min_row as isize,
        bbox.min_col as isize,
        height as isize - bbox.max_row as isize - 1,
        width as isize - bbox.max_col as isize - 1,
    ];
    gaps.into_iter().min().unwrap_or(0) <= margin as isize
}

/// One labeled connected component.
#[derive(Debug, Clone)]
pub struct Region {
    pub label: u32,
    pub area: usize,
    pub bbox: BoundingBox,
    /// Member pixels as `(x, y)`, in raster order.
    pub coords: Vec<(usize, usize)>,
    /// Mean pixel position (`x` = column).
    pub centroid: DVec2,
}

impl Region {
    /// Normalized inertia tensor in `(column, row)` order:
    /// `[[μ02, -μ11], [-μ11, μ20]] / μ00` with `μpq` the central moment of
    /// rows to power `p` and columns to power `q`.
    pub fn inertia_tensor(&self) -> [[f64; 2]; 2] {
        let n = self.area as f64;
        let (mut cc, mut rr, mut rc) = (0.0, 0.0, 0.0);
        for &(x, y) in &self.coords {
            let dc = x as f64 - self.centroid.x;
            let dr = y as f64 - self.centroid.y;
            cc += dc * dc;
            rr += dr * dr;
            rc += dr * dc;
        }
        [[cc / n, -rc / n], [-rc / n, rr / n]]
    }

    /// Eigenvalues of the inertia tensor, largest first.
    pub fn inertia_tensor_eigvals(&self) -> (f64, f64) {
        let [[a, b], [_, d]] = self.inertia_tensor();
        let half_trace = 0.5 * (a + d);
        let radius = (0.25 * (a - d).powi(2) + b * b).sqrt();
        (half_trace + radius, (half_trace - radius).max(0.0))
    }

    /// Eccentricity of the ellipse with the same second moments.
    pub fn eccentricity(&self) -> f64 {
        let (l1, l2) = self.inertia_tensor_eigvals();
        if l1 == 0.0 {
            0.0
        } else {
            (1.0 - l2 / l1).sqrt()
        }
    }

    pub fn orientation(&self) -> f64 {
        orientation_by_eig(self.inertia_tensor())
    }

    /// Binary mask of this region inside `bbox`, which must contain it.
    pub fn crop_mask(&self, bbox: BoundingBox) -> Mask {
        let mut mask = Mask::new_default(bbox.width(), bbox.height());
        for &(x, y) in &self.coords {
            if (bbox.min_col..bbox.max_col).contains(&x) && (bbox.min_row..bbox.max_row).contains(&y)
            {
                *mask.get_mut(x - bbox.min_col, y - bbox.min_row) = true;
            }
        }
        mask
    }
}

/// Major-axis angle from the inertia tensor, measured from the column axis
/// towards increasing rows, in `(-π/2, π/2]`.
///
/// Equal diagonal moments and a vanishing cross moment are resolved
/// explicitly instead of through `atan2`.
pub fn orientation_by_eig(tensor: [[f64; 2]; 2]) -> f64 {
    let u20 = tensor[0][0];
    let u11 = -tensor[0][1];
    let u02 = tensor[1][1];
    if u20 == u02 {
        if u11 == 0.0 {
            0.0
        } else if u11 > 0.0 {
            FRAC_PI_4
        } else {
            -FRAC_PI_4
        }
    } else if u11 == 0.0 {
        if u20 < u02 {
            -FRAC_PI_2
        } else {
            0.0
        }
    } else {
        let base = 0.5 * (2.0 * u11 / (u20 - u02)).atan();
        if u20 > u02 {
            base
        } else if u11 > 0.0 {
            base + FRAC_PI_2
        } else {
            base - FRAC_PI_2
        }
    }
}

/// Properties of every labeled component, ordered by label.
pub fn regionprops(labels: &LabelMap) -> Vec<Region> {
    collect_regions(labels.labels(), labels.num_labels())
}

fn collect_regions(labels: &LabelImage, num_labels: usize) -> Vec<Region> {
    let mut coords: Vec<Vec<(usize, usize)>> = vec![Vec::new(); num_labels];
    for y in 0..labels.height() {
        for (x, &l) in labels.row(y).iter().enumerate() {
            if l != 0 {
                coords[(l - 1) as usize].push((x, y));
            }
        }
    }

    coords
        .into_iter()
        .enumerate()
        .filter(|(_, c)| !c.is_empty())
        .map(|(i, coords)| {
            let mut bbox = BoundingBox {
                min_row: usize::MAX,
                min_col: usize::MAX,
                max_row: 0,
                max_col: 0,
            };
            let mut sum = DVec2::ZERO;
            for &(x, y) in &coords {
                bbox.min_row = bbox.min_row.min(y);
                bbox.min_col = bbox.min_col.min(x);
                bbox.max_row = bbox.max_row.max(y + 1);
                bbox.max_col = bbox.max_col.max(x + 1);
                sum += DVec2::new(x as f64, y as f64);
            }
            Region {
                label: i as u32 + 1,
                area: coords.len(),
                bbox,
                centroid: sum / coords.len() as f64,
                coords,
            }
        })
        .collect()
}
