//! Spot proximity classification for spatial transcriptomics data.
//!
//! Given the spot table of one or more tissue samples and two
//! marker-positive spot groups, this crate:
//! 1. Builds a spatial adjacency graph per sample (k-nearest-neighbour
//!    or Delaunay triangulation).
//! 2. Computes hop distances from every spot to the nearest member of
//!    each group (multi-source BFS, capped at a maximum search radius).
//! 3. Partitions all spots into seven mutually exclusive proximity
//!    categories (double-positive, group1/group2-positive, near-group1,
//!    excluded-as-ambiguous, double-negative).
//!
//! The result is an augmented spot table with `distance_to_group1`,
//! `distance_to_group2` and `classification_label` columns for
//! downstream visualization and statistics. Everything is a pure
//! transformation of its inputs: graphs and distance maps are built once
//! and never mutated, so re-classifying with a different exclusion
//! radius never touches the graph stage.

pub mod classify;
pub mod config;
pub mod distance;
pub mod graph;
pub mod markers;
pub mod pipeline;
pub mod spot;

pub use classify::{classify_spots, label_counts, SpotClass};
pub use config::{AdjacencyMode, ProximityConfig};
pub use distance::{distance_to_nearest, DistanceMap, GraphDistance};
pub use graph::SpatialGraph;
pub use markers::{MarkerMatrix, MembershipRule};
pub use pipeline::{check_groups, run_pipeline, ProximityResult, SampleSummary};
pub use spot::{load_spot_table, write_augmented, ColumnSpec, SpotRecord, SpotTable};
