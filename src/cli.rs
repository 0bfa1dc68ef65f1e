//! Command-line interface for the spot proximity classifier.
//!
//! Thin wrapper over the library: loads a spot table CSV, derives group
//! membership from two marker columns, runs the pipeline, and writes the
//! augmented table (plus an optional JSON summary).

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::fs::File;
use std::path::PathBuf;

use spot_proximity::config::{AdjacencyMode, ProximityConfig};
use spot_proximity::markers::MembershipRule;
use spot_proximity::pipeline::{check_groups, run_pipeline};
use spot_proximity::spot::{load_spot_table, write_augmented, ColumnSpec};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Positive when the marker value exceeds a fixed cutoff.
    Threshold,
    /// Positive when the marker value exceeds a quantile of its column.
    Quantile,
    /// Positive when the marker value is greater than zero.
    Nonzero,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Knn,
    Delaunay,
}

/// Classify spots by graph proximity between two marker-positive groups.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input spot table CSV (id, x, y, optional sample, marker columns).
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Output path for the augmented spot table CSV.
    #[arg(short, long, required = true)]
    pub output: PathBuf,

    /// Marker column defining group 1 membership.
    #[arg(long)]
    pub group1: String,

    /// Marker column defining group 2 membership.
    #[arg(long)]
    pub group2: String,

    /// Membership rule applied to both marker columns.
    #[arg(long, value_enum, default_value_t = RuleKind::Nonzero)]
    pub rule: RuleKind,

    /// Cutoff for group 1 (threshold value, or quantile in [0,1)).
    #[arg(long)]
    pub group1_cutoff: Option<f64>,

    /// Cutoff for group 2 (threshold value, or quantile in [0,1)).
    #[arg(long)]
    pub group2_cutoff: Option<f64>,

    /// Adjacency graph construction mode.
    #[arg(long, value_enum, default_value_t = ModeKind::Knn)]
    pub mode: ModeKind,

    /// Number of nearest neighbours per spot (knn mode).
    #[arg(short = 'k', long, default_value_t = 6)]
    pub k: usize,

    /// Drop Delaunay edges longer than this (delaunay mode).
    #[arg(long)]
    pub max_edge_length: Option<f64>,

    /// Maximum BFS search radius in hops.
    #[arg(long, default_value_t = 10)]
    pub dmax: u32,

    /// Hop radius around group 2 treated as ambiguous.
    #[arg(long, default_value_t = 2)]
    pub exclusion_radius: u32,

    /// Override the autodetected spot id column.
    #[arg(long)]
    pub id_col: Option<String>,

    /// Override the autodetected x coordinate column.
    #[arg(long)]
    pub x_col: Option<String>,

    /// Override the autodetected y coordinate column.
    #[arg(long)]
    pub y_col: Option<String>,

    /// Override the autodetected sample column.
    #[arg(long)]
    pub sample_col: Option<String>,

    /// Fail when either group has no member spots.
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Write per-sample summaries to this JSON file.
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Number of threads to use (0 = all cores).
    #[arg(short = 't', long, default_value_t = 0)]
    pub threads: usize,
}

fn membership_rule(kind: RuleKind, cutoff: Option<f64>, flag: &str) -> Result<MembershipRule> {
    match kind {
        RuleKind::Threshold => {
            let cutoff = cutoff
                .with_context(|| format!("--{} is required with the threshold rule", flag))?;
            Ok(MembershipRule::AboveThreshold(cutoff))
        }
        RuleKind::Quantile => Ok(MembershipRule::AboveQuantile(cutoff.unwrap_or(0.9))),
        RuleKind::Nonzero => Ok(MembershipRule::NonZero),
    }
}

/// Main entry point for CLI
pub fn run_cli(cli: Cli) -> Result<()> {
    let columns = ColumnSpec {
        id: cli.id_col.clone(),
        x: cli.x_col.clone(),
        y: cli.y_col.clone(),
        sample: cli.sample_col.clone(),
    };
    let (table, markers) = load_spot_table(&cli.input, &columns)
        .with_context(|| format!("loading spot table '{}'", cli.input.display()))?;
    info!(
        "Loaded {} spots with {} marker column(s).",
        table.len(),
        markers.n_markers()
    );

    let rule1 = membership_rule(cli.rule, cli.group1_cutoff, "group1-cutoff")?;
    let rule2 = membership_rule(cli.rule, cli.group2_cutoff, "group2-cutoff")?;
    let group1 = markers
        .derive_membership(&cli.group1, &rule1)
        .with_context(|| format!("deriving group1 membership from '{}'", cli.group1))?;
    let group2 = markers
        .derive_membership(&cli.group2, &rule2)
        .with_context(|| format!("deriving group2 membership from '{}'", cli.group2))?;
    if cli.strict {
        check_groups(&group1, &group2)?;
    }

    let adjacency = match cli.mode {
        ModeKind::Knn => AdjacencyMode::Knn { k: cli.k },
        ModeKind::Delaunay => AdjacencyMode::Delaunay {
            max_edge_length: cli.max_edge_length,
        },
    };
    let config = ProximityConfig {
        adjacency,
        dmax: cli.dmax,
        exclusion_radius: cli.exclusion_radius,
    };

    let result = run_pipeline(&table, &group1, &group2, &config)?;

    write_augmented(
        &cli.output,
        &table,
        &markers,
        &result.distance_to_group1,
        &result.distance_to_group2,
        &result.labels,
    )
    .with_context(|| format!("writing augmented table '{}'", cli.output.display()))?;
    println!("Wrote augmented spot table: {}", cli.output.display());

    if let Some(summary_path) = &cli.summary {
        let file = File::create(summary_path)
            .with_context(|| format!("creating summary file '{}'", summary_path.display()))?;
        serde_json::to_writer_pretty(file, &result.samples)?;
        println!("Wrote sample summaries: {}", summary_path.display());
    }

    for summary in &result.samples {
        println!(
            "Sample {}: {} spots, {} group1, {} group2",
            summary.sample, summary.n_spots, summary.n_group1, summary.n_group2
        );
        for (label, count) in &summary.label_counts {
            println!("  {:<32} {}", label, count);
        }
    }
    Ok(())
}
