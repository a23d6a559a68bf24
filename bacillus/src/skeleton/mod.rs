//! Skeleton graph extraction.
//!
//! A cell mask is thinned, its pixels are classified into endpoints, paths
//! and junctions, and branches are walked from anchor to anchor. Malformed
//! skeletons produce no branches rather than an error.

pub mod graph;
pub mod thinning;

pub use graph::{locate_nodes, neighbor_search, Nodes, Pixel, PixelState, StateMap};
pub use thinning::skeletonize;

use crate::config::SkeletonConfig;
use crate::Mask;

/// One walked branch of a skeleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonBranch {
    /// Pixels in walk order.
    pub points: Vec<Pixel>,
    /// Whether the start and the end are dead ends of the skeleton rather
    /// than junctions.
    pub real_poles: [bool; 2],
}

impl SkeletonBranch {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeletonStatus {
    Accepted,
    TooFewEndpoints,
    TooManyBranchPoints,
    /// The walk used all `max_iterations` branch walks, whether or not
    /// anchors were left.
    IterationBudgetExhausted,
}

#[derive(Debug, Clone)]
pub struct SkeletonAnalysis {
    /// Empty unless `status` is [`SkeletonStatus::Accepted`].
    pub branches: Vec<SkeletonBranch>,
    /// Final pixel states, for inspection.
    pub states: StateMap,
    pub nodes: Nodes,
    pub status: SkeletonStatus,
}

/// Thins `mask` and walks the resulting skeleton into branches.
pub fn skeleton_analysis(mask: &Mask, config: &SkeletonConfig) -> SkeletonAnalysis {
    config.validate();

    let mut states = skeletonize(mask).map(|&v| {
        if v {
            PixelState::Path
        } else {
            PixelState::Background
        }
    });
    let nodes = locate_nodes(&mut states, config.min_skeleton_pixels);

    let rejected = if nodes.endpoints.len() < config.min_endpoints {
        Some(SkeletonStatus::TooFewEndpoints)
    } else if nodes.branch_points.len() > config.max_branch_points {
        Some(SkeletonStatus::TooManyBranchPoints)
    } else {
        None
    };
    if let Some(status) = rejected {
        tracing::debug!(
            endpoints = nodes.endpoints.len(),
            branch_points = nodes.branch_points.len(),
            ?status,
            "skeleton rejected"
        );
        return SkeletonAnalysis {
            branches: Vec::new(),
            states,
            nodes,
            status,
        };
    }

    let mut anchors: Vec<Pixel> = nodes
        .endpoints
        .iter()
        .chain(&nodes.branch_points)
        .copied()
        .collect();
    let mut branches = Vec::new();
    let mut iterations = 0;

    while !anchors.is_empty() && iterations < config.max_iterations {
        let start = anchors.remove(0);
        let mut real_poles = [nodes.endpoints.contains(&start), false];
        let mut points = neighbor_search(&mut states, start, config.max_walk_steps);

        if let Some(&last) = points.last() {
            let (junctions, node) = graph::closing_node(&states, last);
            if junctions.is_empty() && nodes.endpoints.contains(&last) {
                real_poles[1] = true;
                anchors.retain(|&a| a != last);
            } else {
                anchors.retain(|&a| a != node);
                points.push(node);
            }
            branches.push(SkeletonBranch { points, real_poles });
        }
        iterations += 1;
    }

    if iterations >= config.max_iterations {
        tracing::debug!(
            iterations,
            remaining = anchors.len(),
            "skeleton walk exhausted its budget"
        );
        return SkeletonAnalysis {
            branches: Vec::new(),
            states,
            nodes,
            status: SkeletonStatus::IterationBudgetExhausted,
        };
    }

    if config.pruning {
        branches.retain(|b| b.len() > config.min_branch_length);
    }

    SkeletonAnalysis {
        branches,
        states,
        nodes,
        status: SkeletonStatus::Accepted,
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;
    use crate::testing::SyntheticCell;

    fn mask_from(rows: &[&str]) -> Mask {
        Mask::from_fn(rows[0].len(), rows.len(), |x, y| rows[y].as_bytes()[x] == b'#')
    }

    #[test]
    fn test_ellipse_gives_single_branch_with_real_poles() {
        let cell = SyntheticCell::new(DVec2::new(32.0, 32.0), 20.0, 8.0, 30f64.to_radians());
        let analysis = skeleton_analysis(&cell.mask(64, 64), &SkeletonConfig::default());
        assert_eq!(analysis.status, SkeletonStatus::Accepted);
        assert_eq!(analysis.branches.len(), 1);
        let branch = &analysis.branches[0];
        assert_eq!(branch.real_poles, [true, true]);
        assert!(branch.len() > 15);
    }

    #[test]
    fn test_y_shape_gives_three_branches() {
        let mask = mask_from(&[
            "...........", //
            ".#.......#.", //
            "..#.....#..", //
            "...#...#...", //
            "....#.#....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            "...........",
        ]);
        let analysis = skeleton_analysis(&mask, &SkeletonConfig::default());
        assert_eq!(analysis.status, SkeletonStatus::Accepted);
        assert_eq!(analysis.nodes.endpoints.len(), 3);
        assert_eq!(analysis.branches.len(), 3);
        for branch in &analysis.branches {
            assert_eq!(branch.real_poles, [true, false]);
            assert_eq!(branch.points.last(), Some(&(5, 5)));
        }
    }

    #[test]
    fn test_comb_has_too_many_branch_points() {
        let mask = Mask::from_fn(40, 8, |x, y| {
            (y == 2 && (2..38).contains(&x)) || ((3..6).contains(&y) && x % 4 == 0 && (4..36).contains(&x))
        });
        let analysis = skeleton_analysis(&mask, &SkeletonConfig::default());
        assert_eq!(analysis.status, SkeletonStatus::TooManyBranchPoints);
        assert!(analysis.branches.is_empty());
        assert!(analysis.nodes.branch_points.len() > 10);
        assert!(analysis.nodes.endpoints.len() >= 2);
    }

    #[test]
    fn test_three_endpoints_with_fifteen_branch_points_is_rejected() {
        // a Y whose stem threads one ring and two diamonds
        let mask = mask_from(&[
            "...........", //
            ".#.......#.", //
            "..#.....#..", //
            "...#...#...", //
            "....#.#....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            "....###....", //
            "....#.#....", //
            "....###....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            "....#.#....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            "....#.#....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            "...........",
        ]);
        let analysis = skeleton_analysis(&mask, &SkeletonConfig::default());
        assert_eq!(analysis.nodes.endpoints.len(), 3);
        assert_eq!(analysis.nodes.branch_points.len(), 15);
        assert_eq!(analysis.status, SkeletonStatus::TooManyBranchPoints);
        assert!(analysis.branches.is_empty());
    }

    #[test]
    fn test_loop_has_no_endpoints() {
        let mask = Mask::from_fn(12, 12, |x, y| {
            let on_x = (2..10).contains(&x) && (y == 2 || y == 9);
            let on_y = (2..10).contains(&y) && (x == 2 || x == 9);
            on_x || on_y
        });
        let analysis = skeleton_analysis(&mask, &SkeletonConfig::default());
        assert_eq!(analysis.status, SkeletonStatus::TooFewEndpoints);
        assert!(analysis.branches.is_empty());
    }

    #[test]
    fn test_exhausted_budget_discards_branches() {
        let mask = mask_from(&[
            "...........", //
            ".#.......#.", //
            "..#.....#..", //
            "...#...#...", //
            "....#.#....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            ".....#.....", //
            "...........",
        ]);
        let config = SkeletonConfig {
            max_iterations: 2,
            ..Default::default()
        };
        let analysis = skeleton_analysis(&mask, &config);
        assert_eq!(analysis.status, SkeletonStatus::IterationBudgetExhausted);
        assert!(analysis.branches.is_empty());
    }

    #[test]
    fn test_pruning_drops_short_branches() {
        let mask = mask_from(&[
            "..............", //
            ".#............", //
            "..#...........", //
            "...#..........", //
            "....##########", //
            "...#..........", //
            "..............",
        ]);
        let kept = skeleton_analysis(&mask, &SkeletonConfig::default());
        let pruned = skeleton_analysis(
            &mask,
            &SkeletonConfig {
                pruning: true,
                min_branch_length: 4,
                ..Default::default()
            },
        );
        assert!(pruned.branches.len() < kept.branches.len());
        assert!(pruned.branches.iter().all(|b| b.len() > 4));
    }
}
