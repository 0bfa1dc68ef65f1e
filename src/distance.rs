//! Hop distances from every spot to the nearest member of a group.
//!
//! One multi-source breadth-first search per group: the frontier is seeded
//! with all group members simultaneously, so the distance to the nearest
//! member falls out of a single O(V+E) traversal instead of one BFS per
//! member. The search never expands past `dmax` hops.
//!
//! Cap policy: a spot whose nearest target lies further than `dmax` hops
//! is reported as [`GraphDistance::Unreachable`]. There is no escape value
//! and no clamping, so a capped result can never be confused with a
//! genuine measurement.

use log::warn;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

use crate::graph::SpatialGraph;

#[derive(Error, Debug)]
pub enum DistanceError {
    #[error("adjacency graph has no edges; hop distances are undefined")]
    DisconnectedGraph,

    #[error("group '{0}' has no member spots")]
    EmptyGroup(String),
}

/// Hop distance to the nearest member of a target group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphDistance {
    /// Shortest-path hop count; 0 means the spot is itself a member.
    Hops(u32),

    /// No member within `dmax` hops (or none at all).
    Unreachable,
}

impl GraphDistance {
    pub fn hops(&self) -> Option<u32> {
        match self {
            GraphDistance::Hops(h) => Some(*h),
            GraphDistance::Unreachable => None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, GraphDistance::Hops(_))
    }

    /// True when the distance is defined and at most `radius` hops.
    /// Unreachable never satisfies a radius comparison.
    pub fn within(&self, radius: u32) -> bool {
        matches!(self, GraphDistance::Hops(h) if *h <= radius)
    }
}

impl fmt::Display for GraphDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphDistance::Hops(h) => write!(f, "{}", h),
            GraphDistance::Unreachable => write!(f, "NA"),
        }
    }
}

/// Distances from every spot of one sample to the nearest member of a
/// target group, indexed by spot position in the sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMap {
    distances: Vec<GraphDistance>,
}

impl DistanceMap {
    pub fn get(&self, spot: usize) -> GraphDistance {
        self.distances[spot]
    }

    pub fn distances(&self) -> &[GraphDistance] {
        &self.distances
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// Number of spots with a defined (non-capped) distance.
    pub fn reachable_count(&self) -> usize {
        self.distances.iter().filter(|d| d.is_reachable()).count()
    }
}

/// Fails with [`DistanceError::EmptyGroup`] when a group has no members.
///
/// An empty group is not an error for the distance computation itself
/// (all distances are vacuously unreachable); callers that want the
/// strict interpretation run this check first.
pub fn require_group(group: &[bool], name: &str) -> Result<(), DistanceError> {
    if group.iter().any(|&m| m) {
        Ok(())
    } else {
        Err(DistanceError::EmptyGroup(name.to_string()))
    }
}

/// Computes the hop distance from every spot to the nearest member of the
/// target group via multi-source BFS, capped at `dmax` hops.
///
/// # Arguments
///
/// * `graph` - Adjacency graph of one sample
/// * `group` - Membership flags, one per spot, aligned with graph nodes
/// * `dmax` - Maximum search radius in hops
///
/// # Returns
///
/// * `Result<DistanceMap>` - Distances for all spots (members have
///   distance 0), or `DisconnectedGraph` when the graph has no edges at
///   all. An empty group yields an all-unreachable map, not an error.
pub fn distance_to_nearest(
    graph: &SpatialGraph,
    group: &[bool],
    dmax: u32,
) -> Result<DistanceMap, DistanceError> {
    assert_eq!(
        graph.node_count(),
        group.len(),
        "membership flags must align with graph nodes"
    );
    if graph.edge_count() == 0 {
        return Err(DistanceError::DisconnectedGraph);
    }

    let n = graph.node_count();
    let mut dist: Vec<Option<u32>> = vec![None; n];
    let mut queue: VecDeque<(usize, u32)> = VecDeque::new();
    for (spot, &member) in group.iter().enumerate() {
        if member {
            dist[spot] = Some(0);
            queue.push_back((spot, 0));
        }
    }
    if queue.is_empty() {
        warn!("Target group is empty; all distances are unreachable.");
    }

    while let Some((spot, d)) = queue.pop_front() {
        if d == dmax {
            continue;
        }
        for neighbor in graph.neighbors(spot) {
            if dist[neighbor].is_none() {
                dist[neighbor] = Some(d + 1);
                queue.push_back((neighbor, d + 1));
            }
        }
    }

    let distances = dist
        .into_iter()
        .map(|d| match d {
            Some(h) => GraphDistance::Hops(h),
            None => GraphDistance::Unreachable,
        })
        .collect();
    Ok(DistanceMap { distances })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdjacencyMode;

    /// Spot positions whose k=1 nearest-neighbour graph is exactly the
    /// chain 0-1-2-...-(n-1): gaps grow left to right, so every spot's
    /// single nearest neighbour is its left-hand one (and spot 0's is
    /// spot 1), which the union symmetrization completes into the chain.
    fn chain_positions(n: usize) -> Vec<[f64; 2]> {
        let mut positions = Vec::with_capacity(n);
        let mut x = 0.0;
        let mut gap = 1.0;
        for _ in 0..n {
            positions.push([x, 0.0]);
            x += gap;
            gap += 0.1;
        }
        positions
    }

    fn chain_graph(n: usize) -> SpatialGraph {
        let graph =
            SpatialGraph::build(&chain_positions(n), &AdjacencyMode::Knn { k: 1 }).unwrap();
        assert_eq!(graph.edge_count(), n - 1);
        graph
    }

    fn membership(n: usize, members: &[usize]) -> Vec<bool> {
        let mut flags = vec![false; n];
        for &m in members {
            flags[m] = true;
        }
        flags
    }

    #[test]
    fn test_line_graph_distances() {
        // 7 spots in a line, group1 = {0}, group2 = {6}, dmax = 10.
        let graph = chain_graph(7);
        let group2 = membership(7, &[6]);

        let to_group2 = distance_to_nearest(&graph, &group2, 10).unwrap();
        assert_eq!(to_group2.get(0), GraphDistance::Hops(6));
        assert_eq!(to_group2.get(3), GraphDistance::Hops(3));
        assert_eq!(to_group2.get(6), GraphDistance::Hops(0));
    }

    #[test]
    fn test_direction_maps_are_independent() {
        let graph = chain_graph(7);
        let group1 = membership(7, &[0, 1]);
        let group2 = membership(7, &[6]);

        let to_group1 = distance_to_nearest(&graph, &group1, 10).unwrap();
        let to_group2 = distance_to_nearest(&graph, &group2, 10).unwrap();
        // Nearest-other-group is not a symmetric relation: spot 6 is 5
        // hops from group1, while spot 0 is 6 hops from group2.
        assert_eq!(to_group1.get(6), GraphDistance::Hops(5));
        assert_eq!(to_group2.get(0), GraphDistance::Hops(6));
    }

    #[test]
    fn test_dual_membership_distance_zero() {
        let graph = chain_graph(5);
        let group1 = membership(5, &[2]);
        let group2 = membership(5, &[2, 4]);

        let to_group1 = distance_to_nearest(&graph, &group1, 10).unwrap();
        let to_group2 = distance_to_nearest(&graph, &group2, 10).unwrap();
        assert_eq!(to_group1.get(2), GraphDistance::Hops(0));
        assert_eq!(to_group2.get(2), GraphDistance::Hops(0));
    }

    #[test]
    fn test_dmax_caps_search() {
        let graph = chain_graph(7);
        let group2 = membership(7, &[6]);

        let capped = distance_to_nearest(&graph, &group2, 3).unwrap();
        assert_eq!(capped.get(3), GraphDistance::Hops(3));
        assert_eq!(capped.get(2), GraphDistance::Unreachable);
        assert_eq!(capped.get(0), GraphDistance::Unreachable);
    }

    #[test]
    fn test_reachable_count_monotone_in_dmax() {
        let graph = chain_graph(7);
        let group2 = membership(7, &[6]);

        let mut previous = 0;
        for dmax in 1..=8 {
            let map = distance_to_nearest(&graph, &group2, dmax).unwrap();
            let reachable = map.reachable_count();
            assert!(reachable >= previous, "dmax={} decreased coverage", dmax);
            previous = reachable;
        }
        assert_eq!(previous, 7); // dmax >= 6 reaches the whole chain
    }

    #[test]
    fn test_empty_group_is_vacuous_not_error() {
        let graph = chain_graph(4);
        let empty = membership(4, &[]);

        let map = distance_to_nearest(&graph, &empty, 5).unwrap();
        assert_eq!(map.reachable_count(), 0);
        assert!(map.distances().iter().all(|d| !d.is_reachable()));

        assert!(matches!(
            require_group(&empty, "group2"),
            Err(DistanceError::EmptyGroup(_))
        ));
        assert!(require_group(&membership(4, &[1]), "group1").is_ok());
    }

    #[test]
    fn test_zero_edge_graph_rejected() {
        // Collinear spots leave the Delaunay builder with no edges.
        let positions = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]];
        let graph = SpatialGraph::build(
            &positions,
            &AdjacencyMode::Delaunay {
                max_edge_length: None,
            },
        )
        .unwrap();
        let result = distance_to_nearest(&graph, &membership(3, &[0]), 5);
        assert!(matches!(result, Err(DistanceError::DisconnectedGraph)));
    }

    #[test]
    fn test_determinism() {
        let graph = chain_graph(7);
        let group = membership(7, &[1, 5]);
        let first = distance_to_nearest(&graph, &group, 4).unwrap();
        let second = distance_to_nearest(&graph, &group, 4).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_within_radius_semantics() {
        assert!(GraphDistance::Hops(0).within(0));
        assert!(GraphDistance::Hops(2).within(2));
        assert!(!GraphDistance::Hops(3).within(2));
        assert!(!GraphDistance::Unreachable.within(u32::MAX));
        assert_eq!(GraphDistance::Unreachable.to_string(), "NA");
        assert_eq!(GraphDistance::Hops(4).to_string(), "4");
    }
}
