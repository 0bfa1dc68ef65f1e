//! Spatial adjacency graph construction.
//!
//! Builds an undirected graph over the spot coordinates of a single
//! tissue sample, either from k-nearest-neighbour queries or from a
//! Delaunay triangulation. The graph is built once per sample and never
//! mutated afterwards; hop distances over it are computed in
//! [`crate::distance`].
//!
//! Symmetrization policy for k-NN graphs: an edge exists when *either*
//! endpoint lists the other among its k nearest neighbours (union). The
//! policy is fixed here, at construction time, so path lengths do not
//! depend on call-site conventions.

use delaunator::{triangulate, Point, EMPTY};
use kiddo::float::distance::SquaredEuclidean;
use kiddo::float::kdtree::KdTree;
use log::warn;
use petgraph::graph::{NodeIndex, UnGraph};
use thiserror::Error;

use crate::config::AdjacencyMode;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("not enough spots to build the adjacency graph: need at least {needed}, got {got}")]
    InsufficientSpots { needed: usize, got: usize },
}

/// Bucket size for the kd-tree.
const KDTREE_BUCKET: usize = 256;

/// Undirected adjacency graph over the spots of one sample.
///
/// Node `i` corresponds to index `i` of the coordinate slice the graph was
/// built from; edge weights hold the Euclidean edge length.
#[derive(Debug, Clone)]
pub struct SpatialGraph {
    graph: UnGraph<(), f64>,
}

impl SpatialGraph {
    /// Builds the adjacency graph for one sample.
    ///
    /// # Arguments
    ///
    /// * `positions` - Spot coordinates, one `[x, y]` pair per spot
    /// * `mode` - Adjacency construction mode
    ///
    /// # Returns
    ///
    /// * `Result<SpatialGraph>` - The graph, or `InsufficientSpots` when
    ///   the mode is undefined for this few spots (`n < k + 1` for k-NN,
    ///   `n < 3` for Delaunay)
    pub fn build(positions: &[[f64; 2]], mode: &AdjacencyMode) -> Result<Self, GraphError> {
        let mut graph = UnGraph::<(), f64>::with_capacity(positions.len(), positions.len() * 3);
        for _ in positions {
            graph.add_node(());
        }
        match mode {
            AdjacencyMode::Knn { k } => add_knn_edges(&mut graph, positions, *k)?,
            AdjacencyMode::Delaunay { max_edge_length } => {
                add_delaunay_edges(&mut graph, positions, *max_edge_length)?
            }
        }
        Ok(SpatialGraph { graph })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterates over the neighbours of a spot.
    pub fn neighbors(&self, spot: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph.neighbors(NodeIndex::new(spot)).map(|n| n.index())
    }

    /// Sorted neighbour indices of a spot.
    pub fn neighbor_set(&self, spot: usize) -> Vec<usize> {
        let mut neighbors: Vec<usize> = self.neighbors(spot).collect();
        neighbors.sort_unstable();
        neighbors
    }
}

fn euclidean(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn add_knn_edges(
    graph: &mut UnGraph<(), f64>,
    positions: &[[f64; 2]],
    k: usize,
) -> Result<(), GraphError> {
    let n = positions.len();
    if n < k + 1 {
        return Err(GraphError::InsufficientSpots { needed: k + 1, got: n });
    }

    let mut tree = KdTree::<f64, u64, 2, KDTREE_BUCKET, u32>::new();
    for (i, p) in positions.iter().enumerate() {
        tree.add(p, i as u64);
    }

    for (i, p) in positions.iter().enumerate() {
        // Query k+1 neighbours: the spot itself comes back at distance 0.
        let neighbors = tree.nearest_n::<SquaredEuclidean>(p, k + 1);
        for nn in neighbors {
            let j = nn.item as usize;
            if j == i {
                continue;
            }
            // update_edge collapses the duplicate from the reverse
            // direction, which is exactly the union symmetrization.
            graph.update_edge(NodeIndex::new(i), NodeIndex::new(j), nn.distance.sqrt());
        }
    }
    Ok(())
}

fn next_halfedge(e: usize) -> usize {
    if e % 3 == 2 {
        e - 2
    } else {
        e + 1
    }
}

fn add_delaunay_edges(
    graph: &mut UnGraph<(), f64>,
    positions: &[[f64; 2]],
    max_edge_length: Option<f64>,
) -> Result<(), GraphError> {
    let n = positions.len();
    if n < 3 {
        return Err(GraphError::InsufficientSpots { needed: 3, got: n });
    }

    let points: Vec<Point> = positions
        .iter()
        .map(|p| Point { x: p[0], y: p[1] })
        .collect();
    let triangulation = triangulate(&points);
    if triangulation.triangles.is_empty() {
        // All spots collinear. The distance stage rejects zero-edge graphs.
        warn!("Delaunay triangulation is degenerate; adjacency graph has no edges.");
        return Ok(());
    }

    for e in 0..triangulation.triangles.len() {
        let twin = triangulation.halfedges[e];
        // Interior edges appear as two halfedges; keep the lower-index one.
        if twin != EMPTY && twin > e {
            continue;
        }
        let a = triangulation.triangles[e];
        let b = triangulation.triangles[next_halfedge(e)];
        let length = euclidean(positions[a], positions[b]);
        if let Some(max_len) = max_edge_length {
            if length > max_len {
                continue;
            }
        }
        graph.update_edge(NodeIndex::new(a), NodeIndex::new(b), length);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Regular hexagonal lattice with unit spacing, odd rows offset.
    fn hex_grid(rows: usize, cols: usize) -> Vec<[f64; 2]> {
        let dy = 3f64.sqrt() / 2.0;
        let mut positions = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let offset = if r % 2 == 1 { 0.5 } else { 0.0 };
                positions.push([c as f64 + offset, r as f64 * dy]);
            }
        }
        positions
    }

    #[test]
    fn test_euclidean_edge_length() {
        use approx::assert_relative_eq;
        assert_relative_eq!(euclidean([0.0, 0.0], [3.0, 4.0]), 5.0, epsilon = 1e-12);
        assert_relative_eq!(euclidean([1.0, 1.0], [1.0, 1.0]), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_knn_union_symmetrization() {
        // With k=1: spot 0 picks 1, spot 1 picks 0, spot 2 picks 1. The
        // union keeps the (1,2) edge even though 1 never picked 2.
        let positions = [[0.0, 0.0], [1.0, 0.0], [3.0, 0.0]];
        let graph = SpatialGraph::build(&positions, &AdjacencyMode::Knn { k: 1 }).unwrap();

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.neighbor_set(1), vec![0, 2]);
    }

    #[test]
    fn test_knn_insufficient_spots() {
        let positions = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]];
        let result = SpatialGraph::build(&positions, &AdjacencyMode::Knn { k: 3 });
        assert!(matches!(
            result,
            Err(GraphError::InsufficientSpots { needed: 4, got: 3 })
        ));
    }

    #[test]
    fn test_knn_hex_grid_reproduces_hex_adjacency() {
        // An interior spot of a hexagonal lattice has exactly 6 neighbours
        // at distance 1; the next ring is at sqrt(3). k=6 must recover the
        // visually adjacent 6 exactly.
        let positions = hex_grid(7, 7);
        let graph = SpatialGraph::build(&positions, &AdjacencyMode::Knn { k: 6 }).unwrap();

        let center = 3 * 7 + 3; // row 3 (offset row), column 3
        let expected = vec![
            2 * 7 + 3, // up-left
            2 * 7 + 4, // up-right
            3 * 7 + 2, // left
            3 * 7 + 4, // right
            4 * 7 + 3, // down-left
            4 * 7 + 4, // down-right
        ];
        assert_eq!(graph.neighbor_set(center), expected);
    }

    #[test]
    fn test_delaunay_square() {
        // Unit square: 4 sides plus one diagonal.
        let positions = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let graph = SpatialGraph::build(
            &positions,
            &AdjacencyMode::Delaunay {
                max_edge_length: None,
            },
        )
        .unwrap();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 5);
    }

    #[test]
    fn test_delaunay_max_edge_length_drops_diagonal() {
        let positions = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let graph = SpatialGraph::build(
            &positions,
            &AdjacencyMode::Delaunay {
                max_edge_length: Some(1.1),
            },
        )
        .unwrap();
        // The sqrt(2) diagonal is gone; every corner keeps its 2 sides.
        assert_eq!(graph.edge_count(), 4);
        for spot in 0..4 {
            assert_eq!(graph.neighbor_set(spot).len(), 2);
        }
    }

    #[test]
    fn test_delaunay_insufficient_spots() {
        let positions = [[0.0, 0.0], [1.0, 0.0]];
        let result = SpatialGraph::build(
            &positions,
            &AdjacencyMode::Delaunay {
                max_edge_length: None,
            },
        );
        assert!(matches!(
            result,
            Err(GraphError::InsufficientSpots { needed: 3, got: 2 })
        ));
    }

    #[test]
    fn test_delaunay_collinear_yields_no_edges() {
        let positions = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]];
        let graph = SpatialGraph::build(
            &positions,
            &AdjacencyMode::Delaunay {
                max_edge_length: None,
            },
        )
        .unwrap();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_delaunay_random_points_connected() {
        let mut rng = StdRng::seed_from_u64(42);
        let positions: Vec<[f64; 2]> = (0..30)
            .map(|_| [rng.random_range(0.0..100.0), rng.random_range(0.0..100.0)])
            .collect();
        let graph = SpatialGraph::build(
            &positions,
            &AdjacencyMode::Delaunay {
                max_edge_length: None,
            },
        )
        .unwrap();

        // A triangulation of n non-collinear points is connected, so it
        // carries at least n-1 edges and every spot has a neighbour.
        assert!(graph.edge_count() >= 29);
        for spot in 0..30 {
            assert!(!graph.neighbor_set(spot).is_empty());
        }
    }
}
