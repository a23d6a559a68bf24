//! Tagged pixel states and the node/branch walk over a thinned skeleton.

use crate::Buffer2;

/// Skeleton pixel as `(x, y)`.
pub type Pixel = (usize, usize);

/// Classification of every pixel of a skeleton during branch extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelState {
    #[default]
    Background,
    /// Unvisited skeleton pixel.
    Path,
    /// Unvisited skeleton pixel with a single neighbour.
    Endpoint,
    /// Junction of three or more skeleton pixels.
    Branch,
    /// Consumed by a walk.
    Visited,
}

impl PixelState {
    #[inline]
    pub fn is_skeleton(self) -> bool {
        self != PixelState::Background
    }

    /// Pixels a walk may still step onto.
    #[inline]
    pub fn is_walkable(self) -> bool {
        matches!(self, PixelState::Path | PixelState::Endpoint)
    }
}

pub type StateMap = Buffer2<PixelState>;

/// Eight-neighbourhood in raster order, centre excluded. Tie-breaks between
/// equally valid neighbours follow this order.
const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Neighbours of `p` whose state satisfies `pred`, in raster order.
pub fn neighbors_where(
    states: &StateMap,
    p: Pixel,
    pred: impl Fn(PixelState) -> bool,
) -> Vec<Pixel> {
    NEIGHBORS
        .iter()
        .filter_map(|&(dx, dy)| {
            let (x, y) = (p.0 as isize + dx, p.1 as isize + dy);
            match states.get_signed(x, y) {
                Some(&s) if pred(s) => Some((x as usize, y as usize)),
                _ => None,
            }
        })
        .collect()
}

#[inline]
fn manhattan(a: Pixel, b: Pixel) -> usize {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
}

/// Endpoints and junctions found by [`locate_nodes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nodes {
    pub endpoints: Vec<Pixel>,
    pub branch_points: Vec<Pixel>,
}

/// Classifies skeleton pixels in raster order.
///
/// One neighbour makes an endpoint, more than two a branch point. A pixel
/// with two neighbours that touch each other is a corner of a staircase and
/// is erased; neighbours it had promoted to branch points are demoted.
/// Skeletons of at most `min_pixels` pixels have no nodes.
pub fn locate_nodes(states: &mut StateMap, min_pixels: usize) -> Nodes {
    let pixels: Vec<Pixel> = (0..states.height())
        .flat_map(|y| (0..states.width()).map(move |x| (x, y)))
        .filter(|&(x, y)| states[(x, y)].is_skeleton())
        .collect();
    let mut nodes = Nodes::default();
    if pixels.len() <= min_pixels {
        return nodes;
    }

    for p in pixels {
        if !states[p].is_skeleton() {
            continue;
        }
        let neighbors = neighbors_where(states, p, PixelState::is_skeleton);
        match neighbors.len() {
            1 => {
                nodes.endpoints.push(p);
                *states.get_mut(p.0, p.1) = PixelState::Endpoint;
            }
            2 if manhattan(neighbors[0], neighbors[1]) == 1 => {
                *states.get_mut(p.0, p.1) = PixelState::Background;
                for n in neighbors {
                    if states[n] == PixelState::Branch {
                        *states.get_mut(n.0, n.1) = PixelState::Path;
                    }
                    nodes.branch_points.retain(|&b| b != n);
                }
            }
            n if n > 2 => {
                nodes.branch_points.push(p);
                *states.get_mut(p.0, p.1) = PixelState::Branch;
            }
            _ => {}
        }
    }
    nodes
}

/// Walks from `start` along unvisited pixels while exactly one continues the
/// path, marking every recorded pixel visited.
///
/// The walk stops on a dead end, at a fork, or after `max_steps` pixels.
pub fn neighbor_search(states: &mut StateMap, start: Pixel, max_steps: usize) -> Vec<Pixel> {
    let mut walked = Vec::new();
    let mut current = start;
    for _ in 0..max_steps {
        let next = neighbors_where(states, current, PixelState::is_walkable);
        *states.get_mut(current.0, current.1) = PixelState::Visited;
        walked.push(current);
        match next.as_slice() {
            [only] => current = *only,
            _ => break,
        }
    }
    walked
}

/// The pixel a finished walk attaches to.
///
/// A single adjacent junction is taken as is; among several, the first one
/// sharing an edge with `last` wins, and without such a junction the walk ends
/// on `last` itself.
pub(super) fn closing_node(states: &StateMap, last: Pixel) -> (Vec<Pixel>, Pixel) {
    let junctions = neighbors_where(states, last, |s| s == PixelState::Branch);
    let node = match junctions.as_slice() {
        [only] => *only,
        many => many
            .iter()
            .copied()
            .find(|&j| manhattan(j, last) == 1)
            .unwrap_or(last),
    };
    (junctions, node)
}
