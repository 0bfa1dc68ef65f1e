//! Proximity classification of spots.
//!
//! Assigns every spot exactly one of seven labels from its group
//! membership, the two distance maps, and the exclusion radius. Rules are
//! evaluated first-match-wins in a fixed precedence order; the order
//! matters because a spot can satisfy several raw conditions (a group1
//! spot inside the exclusion radius of group2 is always excluded, never
//! group1-positive, even though both conditions hold).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::distance::{DistanceMap, GraphDistance};

/// Proximity category of a spot. Exactly one label per spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpotClass {
    /// Member of both groups.
    DoublePositive,
    /// Group 2 member directly adjacent to (or at) a group 1 spot.
    Group2NearGroup1,
    /// Group 1 member within the exclusion radius of group 2: too close
    /// to serve as a clean negative control, but not positive itself.
    Group1Excluded,
    /// Group 1 member clear of group 2.
    Group1Positive,
    /// Group 2 member not adjacent to group 1.
    Group2Positive,
    /// Non-member within the exclusion radius of group 2: ambiguous
    /// background near group 2 signal.
    BackgroundExcluded,
    /// Non-member clear of both groups.
    DoubleNegative,
}

impl SpotClass {
    /// The label string written to the augmented table.
    pub fn label(&self) -> &'static str {
        match self {
            SpotClass::DoublePositive => "double_positive",
            SpotClass::Group2NearGroup1 => "group2_positive_group1_adjacent",
            SpotClass::Group1Excluded => "excluded_group1",
            SpotClass::Group1Positive => "group1_positive",
            SpotClass::Group2Positive => "group2_positive",
            SpotClass::BackgroundExcluded => "excluded_background",
            SpotClass::DoubleNegative => "double_negative",
        }
    }

    /// Collapses the two exclusion labels for downstream statistics that
    /// only care whether a spot was excluded.
    pub fn is_excluded(&self) -> bool {
        matches!(self, SpotClass::Group1Excluded | SpotClass::BackgroundExcluded)
    }

    /// All labels in precedence order.
    pub fn all() -> [SpotClass; 7] {
        [
            SpotClass::DoublePositive,
            SpotClass::Group2NearGroup1,
            SpotClass::Group1Excluded,
            SpotClass::Group1Positive,
            SpotClass::Group2Positive,
            SpotClass::BackgroundExcluded,
            SpotClass::DoubleNegative,
        ]
    }
}

/// Classifies one spot. Rule order is the documented precedence; the
/// first matching rule wins.
fn classify_one(
    in_group1: bool,
    in_group2: bool,
    to_group1: GraphDistance,
    to_group2: GraphDistance,
    exclusion_radius: u32,
) -> SpotClass {
    if in_group1 && in_group2 {
        SpotClass::DoublePositive
    } else if in_group2 && to_group1.within(1) {
        SpotClass::Group2NearGroup1
    } else if in_group1 && to_group2.within(exclusion_radius) {
        SpotClass::Group1Excluded
    } else if in_group1 {
        SpotClass::Group1Positive
    } else if in_group2 {
        SpotClass::Group2Positive
    } else if to_group2.within(exclusion_radius) {
        SpotClass::BackgroundExcluded
    } else {
        SpotClass::DoubleNegative
    }
}

/// Labels every spot of one sample.
///
/// # Arguments
///
/// * `group1`, `group2` - Membership flags, one per spot
/// * `to_group1`, `to_group2` - Distance maps to the nearest member of
///   each group
/// * `exclusion_radius` - Hop radius around group 2 treated as ambiguous
///
/// # Returns
///
/// * `Vec<SpotClass>` - Exactly one label per spot, in spot order
pub fn classify_spots(
    group1: &[bool],
    group2: &[bool],
    to_group1: &DistanceMap,
    to_group2: &DistanceMap,
    exclusion_radius: u32,
) -> Vec<SpotClass> {
    assert_eq!(group1.len(), group2.len());
    assert_eq!(group1.len(), to_group1.len());
    assert_eq!(group1.len(), to_group2.len());

    (0..group1.len())
        .map(|spot| {
            classify_one(
                group1[spot],
                group2[spot],
                to_group1.get(spot),
                to_group2.get(spot),
                exclusion_radius,
            )
        })
        .collect()
}

/// Tallies labels, listing all seven categories even when empty.
pub fn label_counts(labels: &[SpotClass]) -> IndexMap<&'static str, usize> {
    let mut counts: IndexMap<&'static str, usize> =
        SpotClass::all().iter().map(|c| (c.label(), 0)).collect();
    for label in labels {
        counts[label.label()] += 1;
    }
    counts
}
