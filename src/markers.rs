//! Marker expression handling and group membership derivation.
//!
//! The proximity classifier itself only consumes boolean membership flags;
//! this module produces them from the marker expression columns of the
//! input table. Membership derivation is a simple thresholding step, the
//! same operation the upstream analysis applies before calling into the
//! classifier.

use ndarray::{Array2, ArrayView1};
use statrs::statistics::{Data, OrderStatistics};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("unknown marker '{0}' (available: {1})")]
    UnknownMarker(String, String),

    #[error("quantile must lie in [0, 1) (got {0})")]
    InvalidQuantile(f64),
}

/// Rule turning a marker expression column into boolean membership.
#[derive(Debug, Clone, PartialEq)]
pub enum MembershipRule {
    /// Positive when the value is strictly greater than the cutoff.
    AboveThreshold(f64),

    /// Positive when the value is strictly greater than the empirical
    /// q-quantile of the marker column.
    AboveQuantile(f64),

    /// Positive when the value is greater than zero. Also handles
    /// pre-derived 0/1 flag columns.
    NonZero,
}

/// Marker expression values for all spots of a table.
///
/// Stores a spots x markers matrix along with marker name lookups; rows
/// align with the spot table rows the matrix was loaded with.
#[derive(Debug, Clone)]
pub struct MarkerMatrix {
    /// The expression matrix (spots x markers).
    values: Array2<f64>,

    /// Mapping from marker index (column) to marker name.
    marker_names: Vec<String>,
    marker_map: HashMap<String, usize>, // For quick lookup
}

impl MarkerMatrix {
    pub fn new(marker_names: Vec<String>, values: Array2<f64>) -> Self {
        let marker_map = marker_names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        MarkerMatrix {
            values,
            marker_names,
            marker_map,
        }
    }

    /// A matrix with no marker columns (tables carrying only coordinates).
    pub fn empty(n_spots: usize) -> Self {
        Self::new(Vec::new(), Array2::zeros((n_spots, 0)))
    }

    pub fn n_spots(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_markers(&self) -> usize {
        self.values.ncols()
    }

    pub fn marker_names(&self) -> &[String] {
        &self.marker_names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Retrieves the expression values for a specific marker.
    pub fn marker_values(&self, marker: &str) -> Option<ArrayView1<f64>> {
        self.marker_map
            .get(marker)
            .map(|&idx| self.values.column(idx))
    }

    /// Derives boolean membership flags for a marker under a rule.
    ///
    /// # Arguments
    ///
    /// * `marker` - Name of the marker column
    /// * `rule` - Thresholding rule to apply
    ///
    /// # Returns
    ///
    /// * `Result<Vec<bool>>` - One flag per spot, in table row order
    pub fn derive_membership(
        &self,
        marker: &str,
        rule: &MembershipRule,
    ) -> Result<Vec<bool>, MarkerError> {
        let column = self.marker_values(marker).ok_or_else(|| {
            MarkerError::UnknownMarker(marker.to_string(), self.marker_names.join(", "))
        })?;

        let cutoff = match rule {
            MembershipRule::AboveThreshold(t) => *t,
            MembershipRule::NonZero => 0.0,
            MembershipRule::AboveQuantile(q) => {
                if !(0.0..1.0).contains(q) {
                    return Err(MarkerError::InvalidQuantile(*q));
                }
                let mut data = Data::new(column.to_vec());
                data.quantile(*q)
            }
        };

        Ok(column.iter().map(|&v| v > cutoff).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn create_test_matrix() -> MarkerMatrix {
        // 10 spots, 2 markers.
        let values = arr2(&[
            [1.0, 0.0],
            [2.0, 0.0],
            [3.0, 1.0],
            [4.0, 0.0],
            [5.0, 0.0],
            [6.0, 2.0],
            [7.0, 0.0],
            [8.0, 0.0],
            [9.0, 5.0],
            [10.0, 0.0],
        ]);
        MarkerMatrix::new(vec!["CD3".into(), "PanCK".into()], values)
    }

    #[test]
    fn test_threshold_membership() {
        let matrix = create_test_matrix();
        let flags = matrix
            .derive_membership("CD3", &MembershipRule::AboveThreshold(7.0))
            .unwrap();
        assert_eq!(flags.iter().filter(|&&f| f).count(), 3);
        assert!(!flags[6]); // 7.0 is not strictly greater than 7.0
        assert!(flags[7]);
    }

    #[test]
    fn test_nonzero_membership() {
        let matrix = create_test_matrix();
        let flags = matrix
            .derive_membership("PanCK", &MembershipRule::NonZero)
            .unwrap();
        assert_eq!(flags, vec![
            false, false, true, false, false, true, false, false, true, false
        ]);
    }

    #[test]
    fn test_quantile_membership() {
        let matrix = create_test_matrix();
        // Median of 1..=10 is 5.5 under the common quantile definitions, so
        // the upper half (6..=10) is positive.
        let flags = matrix
            .derive_membership("CD3", &MembershipRule::AboveQuantile(0.5))
            .unwrap();
        assert_eq!(flags.iter().filter(|&&f| f).count(), 5);
        assert!(!flags[4]);
        assert!(flags[5]);
    }

    #[test]
    fn test_unknown_marker() {
        let matrix = create_test_matrix();
        let result = matrix.derive_membership("FOXP3", &MembershipRule::NonZero);
        assert!(matches!(result, Err(MarkerError::UnknownMarker(..))));
    }

    #[test]
    fn test_invalid_quantile() {
        let matrix = create_test_matrix();
        for q in [-0.1, 1.0, 1.5] {
            let result = matrix.derive_membership("CD3", &MembershipRule::AboveQuantile(q));
            assert!(matches!(result, Err(MarkerError::InvalidQuantile(_))));
        }
    }

    #[test]
    fn test_empty_matrix() {
        let matrix = MarkerMatrix::empty(4);
        assert_eq!(matrix.n_spots(), 4);
        assert_eq!(matrix.n_markers(), 0);
        assert!(matrix.marker_values("CD3").is_none());
    }
}
