//! Spot table handling module.
//!
//! This module provides structures and functions for working with spot
//! tables: the per-site records of a spatial transcriptomics sample
//! (identifier, planar coordinates, originating tissue sample) plus the
//! marker expression columns used to derive group membership.
//!
//! Loading is a pure transformation from a CSV file to a [`SpotTable`] and
//! a [`MarkerMatrix`]; writing produces the augmented table with the three
//! proximity columns appended. Nothing is mutated in place between
//! pipeline stages.

use indexmap::IndexMap;
use itertools::izip;
use log::warn;
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;

use crate::classify::SpotClass;
use crate::distance::GraphDistance;
use crate::markers::MarkerMatrix;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spot table missing required {kind} column (tried: {tried})")]
    MissingColumn { kind: &'static str, tried: String },

    #[error("duplicate spot id '{0}'")]
    DuplicateSpotId(String),

    #[error("empty spot id in row {0}")]
    EmptySpotId(usize),

    #[error("spot '{spot}': cannot parse {column} value '{value}' as a coordinate")]
    BadCoordinate {
        spot: String,
        column: String,
        value: String,
    },

    #[error("no valid spot rows found in '{0}'")]
    NoSpots(String),
}

/// Sample name assigned when the input table has no sample column.
pub const DEFAULT_SAMPLE: &str = "default";

/// Conventional header names, checked case-insensitively in order, for
/// tables exported by the common spatial platforms.
const ID_CANDIDATES: &[&str] = &["spot_id", "barcode", "spot", "id"];
const X_CANDIDATES: &[&str] = &["x", "array_col", "col", "imagecol"];
const Y_CANDIDATES: &[&str] = &["y", "array_row", "row", "imagerow"];
const SAMPLE_CANDIDATES: &[&str] = &["sample", "sample_id", "slide", "section"];

/// One spatial sampling site.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpotRecord {
    /// Unique identifier (e.g. a Visium barcode).
    pub id: String,
    /// Planar coordinates; units are whatever the platform exports.
    pub x: f64,
    pub y: f64,
    /// Tissue sample / section this spot belongs to. Spots from different
    /// samples never share graph edges.
    pub sample: String,
}

/// An ordered collection of spots with unique identifiers.
///
/// Row order is the input order and is preserved through the whole
/// pipeline; all per-spot vectors (membership flags, distance maps,
/// labels) are indexed by table row.
#[derive(Debug, Clone)]
pub struct SpotTable {
    spots: Vec<SpotRecord>,
    id_index: IndexMap<String, usize>,
}

impl SpotTable {
    /// Builds a table from records, rejecting empty and duplicate ids.
    pub fn new(spots: Vec<SpotRecord>) -> Result<Self, TableError> {
        let mut id_index = IndexMap::with_capacity(spots.len());
        for (row, spot) in spots.iter().enumerate() {
            if spot.id.is_empty() {
                return Err(TableError::EmptySpotId(row));
            }
            if id_index.insert(spot.id.clone(), row).is_some() {
                return Err(TableError::DuplicateSpotId(spot.id.clone()));
            }
        }
        Ok(SpotTable { spots, id_index })
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    pub fn spots(&self) -> &[SpotRecord] {
        &self.spots
    }

    /// Row index of a spot id, if present.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.id_index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&SpotRecord> {
        self.index_of(id).map(|i| &self.spots[i])
    }

    /// Coordinates of the given rows, in row order.
    pub fn positions_of(&self, rows: &[usize]) -> Vec<[f64; 2]> {
        rows.iter().map(|&i| [self.spots[i].x, self.spots[i].y]).collect()
    }

    /// Partitions row indices by sample, preserving first-seen sample
    /// order and input row order within each sample.
    pub fn samples(&self) -> IndexMap<String, Vec<usize>> {
        let mut samples: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (row, spot) in self.spots.iter().enumerate() {
            samples.entry(spot.sample.clone()).or_default().push(row);
        }
        samples
    }
}

/// Explicit column name overrides; `None` falls back to the conventional
/// candidate lists.
#[derive(Debug, Clone, Default)]
pub struct ColumnSpec {
    pub id: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub sample: Option<String>,
}

fn find_column(
    headers: &csv::StringRecord,
    explicit: Option<&str>,
    candidates: &[&str],
) -> Option<usize> {
    match explicit {
        Some(name) => headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name)),
        None => candidates.iter().find_map(|cand| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(cand))
        }),
    }
}

fn missing(kind: &'static str, explicit: Option<&str>, candidates: &[&str]) -> TableError {
    let tried = match explicit {
        Some(name) => name.to_string(),
        None => candidates.join(", "),
    };
    TableError::MissingColumn { kind, tried }
}

/// Loads a spot table and its marker expression matrix from a CSV file.
///
/// The id, x and y columns are required; the sample column is optional
/// (all spots fall into [`DEFAULT_SAMPLE`] without one). Every remaining
/// column is treated as a marker column and kept when all of its non-empty
/// cells parse as numbers; empty cells count as 0.0, and columns with any
/// non-numeric cell are dropped with a warning (free-text annotation
/// columns are common in these exports).
///
/// # Arguments
///
/// * `path` - Path to the spot table CSV file
/// * `columns` - Explicit column name overrides
///
/// # Returns
///
/// * `Result<(SpotTable, MarkerMatrix)>` - Table and row-aligned marker
///   matrix, or an error
pub fn load_spot_table(
    path: impl AsRef<Path>,
    columns: &ColumnSpec,
) -> Result<(SpotTable, MarkerMatrix), TableError> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();

    let id_col = find_column(&headers, columns.id.as_deref(), ID_CANDIDATES)
        .ok_or_else(|| missing("spot id", columns.id.as_deref(), ID_CANDIDATES))?;
    let x_col = find_column(&headers, columns.x.as_deref(), X_CANDIDATES)
        .ok_or_else(|| missing("x coordinate", columns.x.as_deref(), X_CANDIDATES))?;
    let y_col = find_column(&headers, columns.y.as_deref(), Y_CANDIDATES)
        .ok_or_else(|| missing("y coordinate", columns.y.as_deref(), Y_CANDIDATES))?;
    let sample_col = find_column(&headers, columns.sample.as_deref(), SAMPLE_CANDIDATES);

    let reserved = [Some(id_col), Some(x_col), Some(y_col), sample_col];
    let marker_cols: Vec<usize> = (0..headers.len())
        .filter(|i| !reserved.contains(&Some(*i)))
        .collect();

    let records: Vec<csv::StringRecord> = rdr.records().collect::<Result<_, _>>()?;
    if records.is_empty() {
        return Err(TableError::NoSpots(path.display().to_string()));
    }

    let mut spots = Vec::with_capacity(records.len());
    for record in &records {
        let id = record.get(id_col).unwrap_or("").trim().to_string();
        let parse_coord = |col: usize| -> Result<f64, TableError> {
            let raw = record.get(col).unwrap_or("").trim();
            raw.parse::<f64>().map_err(|_| TableError::BadCoordinate {
                spot: id.clone(),
                column: headers.get(col).unwrap_or("?").to_string(),
                value: raw.to_string(),
            })
        };
        let x = parse_coord(x_col)?;
        let y = parse_coord(y_col)?;
        let sample = match sample_col {
            Some(col) => {
                let raw = record.get(col).unwrap_or("").trim();
                if raw.is_empty() {
                    DEFAULT_SAMPLE.to_string()
                } else {
                    raw.to_string()
                }
            }
            None => DEFAULT_SAMPLE.to_string(),
        };
        spots.push(SpotRecord { id, x, y, sample });
    }
    let table = SpotTable::new(spots)?;

    // Parse marker columns, dropping any that fail wholesale.
    let mut kept_names = Vec::new();
    let mut kept_values: Vec<Vec<f64>> = Vec::new();
    for &col in &marker_cols {
        let name = headers.get(col).unwrap_or("").trim().to_string();
        let mut values = Vec::with_capacity(records.len());
        let mut ok = true;
        for record in &records {
            let raw = record.get(col).unwrap_or("").trim();
            if raw.is_empty() {
                values.push(0.0);
                continue;
            }
            match raw.parse::<f64>() {
                Ok(v) => values.push(v),
                Err(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            kept_names.push(name);
            kept_values.push(values);
        } else {
            warn!("Dropping non-numeric column '{}' from marker matrix.", name);
        }
    }

    let n_spots = table.len();
    let n_markers = kept_names.len();
    let mut values = Array2::<f64>::zeros((n_spots, n_markers));
    for (m, column) in kept_values.iter().enumerate() {
        for (s, &v) in column.iter().enumerate() {
            values[[s, m]] = v;
        }
    }
    let markers = MarkerMatrix::new(kept_names, values);

    Ok((table, markers))
}

/// Writes the augmented spot table: the original identifier, coordinate,
/// sample and marker columns, plus `distance_to_group1`,
/// `distance_to_group2` and `classification_label`.
///
/// Unreachable distances are written as `NA` so capped values can never be
/// misread as genuine hop counts.
pub fn write_augmented(
    path: impl AsRef<Path>,
    table: &SpotTable,
    markers: &MarkerMatrix,
    distance_to_group1: &[GraphDistance],
    distance_to_group2: &[GraphDistance],
    labels: &[SpotClass],
) -> Result<(), TableError> {
    assert_eq!(table.len(), distance_to_group1.len());
    assert_eq!(table.len(), distance_to_group2.len());
    assert_eq!(table.len(), labels.len());

    let mut wtr = csv::Writer::from_path(path.as_ref())?;

    let mut header = vec!["spot_id", "x", "y", "sample"];
    header.extend(markers.marker_names().iter().map(String::as_str));
    header.extend([
        "distance_to_group1",
        "distance_to_group2",
        "classification_label",
    ]);
    wtr.write_record(&header)?;

    for (row, (spot, d1, d2, label)) in
        izip!(table.spots(), distance_to_group1, distance_to_group2, labels).enumerate()
    {
        let mut record = vec![
            spot.id.clone(),
            spot.x.to_string(),
            spot.y.to_string(),
            spot.sample.clone(),
        ];
        for m in 0..markers.n_markers() {
            record.push(markers.values()[[row, m]].to_string());
        }
        record.push(d1.to_string());
        record.push(d2.to_string());
        record.push(label.label().to_string());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
