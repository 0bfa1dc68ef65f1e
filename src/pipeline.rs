//! End-to-end proximity classification pipeline.
//!
//! Pure transformation: spot table + membership flags + configuration in,
//! row-aligned distance vectors and labels out. Stages run in a fixed
//! order per sample (validate, build graph, BFS both directions,
//! classify); samples are independent and processed in parallel. Nothing
//! is mutated between stages, so re-running with a different exclusion
//! radius or dmax is just another call.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classify::{classify_spots, label_counts, SpotClass};
use crate::config::ProximityConfig;
use crate::distance::{distance_to_nearest, require_group, DistanceError, GraphDistance};
use crate::graph::SpatialGraph;
use crate::spot::SpotTable;

/// Per-sample classification report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub sample: String,
    pub n_spots: usize,
    pub n_group1: usize,
    pub n_group2: usize,
    pub n_edges: usize,
    pub label_counts: IndexMap<String, usize>,
}

/// Pipeline output, row-aligned with the input spot table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityResult {
    /// Hop distance from each spot to the nearest group 1 member.
    pub distance_to_group1: Vec<GraphDistance>,
    /// Hop distance from each spot to the nearest group 2 member.
    pub distance_to_group2: Vec<GraphDistance>,
    /// Proximity label of each spot.
    pub labels: Vec<SpotClass>,
    /// One summary per sample, in first-seen sample order.
    pub samples: Vec<SampleSummary>,
}

struct SampleOutput {
    rows: Vec<usize>,
    to_group1: Vec<GraphDistance>,
    to_group2: Vec<GraphDistance>,
    labels: Vec<SpotClass>,
    summary: SampleSummary,
}

/// Strict empty-group policy: fails when either group has no members
/// anywhere in the table. The pipeline itself treats empty groups as
/// vacuously unreachable; callers opt into this check.
pub fn check_groups(group1: &[bool], group2: &[bool]) -> Result<(), DistanceError> {
    require_group(group1, "group1")?;
    require_group(group2, "group2")
}

/// Runs the full pipeline over a spot table.
///
/// # Arguments
///
/// * `table` - Spot table (may span several samples)
/// * `group1`, `group2` - Membership flags, one per table row
/// * `config` - Validated at entry; see [`ProximityConfig::validate`]
///
/// # Returns
///
/// * `Result<ProximityResult>` - Distances and labels for every row, plus
///   per-sample summaries
pub fn run_pipeline(
    table: &SpotTable,
    group1: &[bool],
    group2: &[bool],
    config: &ProximityConfig,
) -> Result<ProximityResult> {
    if table.is_empty() {
        bail!("spot table is empty");
    }
    if group1.len() != table.len() || group2.len() != table.len() {
        bail!(
            "membership flags must match the table: {} spots, {} group1 flags, {} group2 flags",
            table.len(),
            group1.len(),
            group2.len()
        );
    }
    config.validate()?;

    let samples: Vec<(String, Vec<usize>)> = table.samples().into_iter().collect();
    info!(
        "Classifying {} spots across {} sample(s).",
        table.len(),
        samples.len()
    );

    let outputs: Vec<SampleOutput> = samples
        .par_iter()
        .map(|(sample, rows)| process_sample(table, sample, rows, group1, group2, config))
        .collect::<Result<_>>()?;

    // Scatter per-sample results back into table row order. The sample
    // partition covers every row exactly once.
    let n = table.len();
    let mut distance_to_group1 = vec![GraphDistance::Unreachable; n];
    let mut distance_to_group2 = vec![GraphDistance::Unreachable; n];
    let mut labels = vec![SpotClass::DoubleNegative; n];
    let mut summaries = Vec::with_capacity(outputs.len());
    for output in outputs {
        for (i, &row) in output.rows.iter().enumerate() {
            distance_to_group1[row] = output.to_group1[i];
            distance_to_group2[row] = output.to_group2[i];
            labels[row] = output.labels[i];
        }
        summaries.push(output.summary);
    }

    Ok(ProximityResult {
        distance_to_group1,
        distance_to_group2,
        labels,
        samples: summaries,
    })
}

fn process_sample(
    table: &SpotTable,
    sample: &str,
    rows: &[usize],
    group1: &[bool],
    group2: &[bool],
    config: &ProximityConfig,
) -> Result<SampleOutput> {
    let positions = table.positions_of(rows);
    let g1: Vec<bool> = rows.iter().map(|&r| group1[r]).collect();
    let g2: Vec<bool> = rows.iter().map(|&r| group2[r]).collect();
    let n_group1 = g1.iter().filter(|&&m| m).count();
    let n_group2 = g2.iter().filter(|&&m| m).count();
    if n_group1 == 0 {
        warn!("Sample '{}': group1 has no members.", sample);
    }
    if n_group2 == 0 {
        warn!("Sample '{}': group2 has no members.", sample);
    }

    let graph = SpatialGraph::build(&positions, &config.adjacency)
        .with_context(|| format!("building adjacency graph for sample '{}'", sample))?;
    let to_group1 = distance_to_nearest(&graph, &g1, config.dmax)
        .with_context(|| format!("computing distances to group1 in sample '{}'", sample))?;
    let to_group2 = distance_to_nearest(&graph, &g2, config.dmax)
        .with_context(|| format!("computing distances to group2 in sample '{}'", sample))?;
    let labels = classify_spots(&g1, &g2, &to_group1, &to_group2, config.exclusion_radius);

    let summary = SampleSummary {
        sample: sample.to_string(),
        n_spots: rows.len(),
        n_group1,
        n_group2,
        n_edges: graph.edge_count(),
        label_counts: label_counts(&labels)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    };

    Ok(SampleOutput {
        rows: rows.to_vec(),
        to_group1: to_group1.distances().to_vec(),
        to_group2: to_group2.distances().to_vec(),
        labels,
        summary,
    })
}
