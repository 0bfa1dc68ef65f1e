//! Configuration for the spot proximity pipeline.
//!
//! A [`ProximityConfig`] bundles everything the pipeline needs beyond the
//! spot table itself: how the adjacency graph is built, how far the
//! breadth-first search is allowed to travel, and how close to group 2 a
//! spot may sit before it is excluded as ambiguous.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("k must be at least 1 for k-nearest-neighbour graphs (got {0})")]
    InvalidK(usize),

    #[error("dmax must be a positive hop count (got {0})")]
    InvalidDmax(u32),

    #[error("max_edge_length must be positive and finite (got {0})")]
    InvalidMaxEdgeLength(f64),
}

/// How the spatial adjacency graph is constructed.
///
/// The symmetrization policy for k-NN graphs is fixed here rather than at
/// call sites: an edge exists when *either* endpoint lists the other among
/// its k nearest neighbours (union). See [`crate::graph::SpatialGraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AdjacencyMode {
    /// Connect each spot to its `k` nearest spots by Euclidean distance.
    Knn { k: usize },

    /// Planar Delaunay triangulation; edges longer than `max_edge_length`
    /// (when given) are dropped to avoid spurious long-range adjacency at
    /// tissue boundaries.
    Delaunay { max_edge_length: Option<f64> },
}

/// Full configuration for one proximity classification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityConfig {
    /// Adjacency graph construction mode.
    pub adjacency: AdjacencyMode,

    /// Maximum BFS search radius in hops; spots further than this from the
    /// nearest target-group member are reported as unreachable.
    pub dmax: u32,

    /// Spots within this many hops of group 2 (but not group 2 members
    /// themselves) are excluded as ambiguous. Zero means only group 2
    /// members themselves are too close.
    pub exclusion_radius: u32,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        // k = 6 matches the hexagonal packing of Visium-style arrays.
        ProximityConfig {
            adjacency: AdjacencyMode::Knn { k: 6 },
            dmax: 10,
            exclusion_radius: 2,
        }
    }
}

impl ProximityConfig {
    /// Validates the configuration before any computation starts.
    ///
    /// The exclusion radius needs no check: it is unsigned, so a negative
    /// value is unrepresentable, and zero is a legal setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.adjacency {
            AdjacencyMode::Knn { k } if k == 0 => return Err(ConfigError::InvalidK(k)),
            AdjacencyMode::Delaunay {
                max_edge_length: Some(len),
            } if len <= 0.0 || !len.is_finite() => {
                return Err(ConfigError::InvalidMaxEdgeLength(len))
            }
            _ => {}
        }
        if self.dmax == 0 {
            return Err(ConfigError::InvalidDmax(self.dmax));
        }
        Ok(())
    }
}
