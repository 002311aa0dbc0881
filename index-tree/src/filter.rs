//! Spatial predicates evaluated on top of the tree's intersection search.
//!
//! ## Two-Phase Query Execution
//!
//! 1. **Phase 1 (R-tree scan)**: every element whose envelope intersects the
//!    query, edge-inclusive. This is a superset for every predicate below
//!    except `Disjoint`.
//! 2. **Phase 2 (refinement)**: each candidate's envelope is tested against
//!    the query with the exact predicate.
//!
//! `Disjoint` is computed as everything under the tree's extent minus the
//! phase 1 result, with no refinement step.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::calculator::GeometryCalculator;
use crate::envelope::Envelope;
use crate::tree::rtree_types::{ElementId, TreeResult};

/// Relation between a stored element (the candidate) and the query envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpatialPredicate {
    /// The envelopes share at least one point.
    Intersects,
    /// The candidate covers the query.
    Contains,
    /// The query covers the candidate.
    Within,
    /// The envelopes meet only along their boundaries.
    Touches,
    /// The envelopes are identical.
    Equals,
    /// The interiors intersect and neither covers the other.
    Overlaps,
    /// The envelopes share no point.
    Disjoint,
}

impl SpatialPredicate {
    /// Exact test of `candidate` against `query`.
    pub fn matches(
        &self,
        calculator: &dyn GeometryCalculator,
        candidate: &Envelope,
        query: &Envelope,
    ) -> bool {
        match self {
            SpatialPredicate::Intersects => calculator.intersects(candidate, query, true),
            SpatialPredicate::Contains => calculator.contains(candidate, query, true),
            SpatialPredicate::Within => calculator.contains(query, candidate, true),
            SpatialPredicate::Touches => calculator.touches(candidate, query),
            SpatialPredicate::Equals => calculator.equals(candidate, query),
            SpatialPredicate::Overlaps => calculator.overlaps(candidate, query),
            SpatialPredicate::Disjoint => !calculator.intersects(candidate, query, true),
        }
    }
}

impl Display for SpatialPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpatialPredicate::Intersects => "intersects",
            SpatialPredicate::Contains => "contains",
            SpatialPredicate::Within => "within",
            SpatialPredicate::Touches => "touches",
            SpatialPredicate::Equals => "equals",
            SpatialPredicate::Overlaps => "overlaps",
            SpatialPredicate::Disjoint => "disjoint",
        };
        write!(f, "{}", name)
    }
}

/// Phase 2 over candidates that carry their stored envelope.
pub(crate) fn refine_entries(
    predicate: SpatialPredicate,
    calculator: &dyn GeometryCalculator,
    query: &Envelope,
    candidates: Vec<(ElementId, Envelope)>,
) -> Vec<ElementId> {
    candidates
        .into_iter()
        .filter(|(_, candidate)| predicate.matches(calculator, candidate, query))
        .map(|(id, _)| id)
        .collect()
}

/// Phase 2 over bare ids, looking envelopes up through `envelope_of`.
/// Ids without an envelope are dropped.
pub(crate) fn refine<F>(
    predicate: SpatialPredicate,
    calculator: &dyn GeometryCalculator,
    query: &Envelope,
    candidates: Vec<ElementId>,
    mut envelope_of: F,
) -> TreeResult<Vec<ElementId>>
where
    F: FnMut(ElementId) -> TreeResult<Option<Envelope>>,
{
    let mut matched = Vec::with_capacity(candidates.len());
    for id in candidates {
        if let Some(candidate) = envelope_of(id)? {
            if predicate.matches(calculator, &candidate, query) {
                matched.push(id);
            }
        }
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::DefaultCalculator;
    use crate::tree::rtree_types::TreeError;

    fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope::from_2d(min_x, min_y, max_x, max_y).unwrap()
    }

    #[test]
    fn test_predicate_matrix() {
        let calc = DefaultCalculator;
        let query = env(0.0, 0.0, 10.0, 10.0);
        let big = env(-1.0, -1.0, 11.0, 11.0);
        let small = env(2.0, 2.0, 3.0, 3.0);
        let edge = env(10.0, 0.0, 12.0, 5.0);
        let crossing = env(5.0, 5.0, 15.0, 15.0);
        let far = env(20.0, 20.0, 21.0, 21.0);

        assert!(SpatialPredicate::Contains.matches(&calc, &big, &query));
        assert!(!SpatialPredicate::Contains.matches(&calc, &small, &query));
        assert!(SpatialPredicate::Within.matches(&calc, &small, &query));
        assert!(SpatialPredicate::Touches.matches(&calc, &edge, &query));
        assert!(!SpatialPredicate::Touches.matches(&calc, &crossing, &query));
        assert!(SpatialPredicate::Overlaps.matches(&calc, &crossing, &query));
        assert!(!SpatialPredicate::Overlaps.matches(&calc, &small, &query));
        assert!(SpatialPredicate::Equals.matches(&calc, &query.clone(), &query));
        assert!(SpatialPredicate::Disjoint.matches(&calc, &far, &query));
        assert!(!SpatialPredicate::Disjoint.matches(&calc, &edge, &query));
        assert!(SpatialPredicate::Intersects.matches(&calc, &edge, &query));
    }

    #[test]
    fn test_refine_with_lookup() {
        let calc = DefaultCalculator;
        let query = env(0.0, 0.0, 10.0, 10.0);
        let lookup = |id: ElementId| -> TreeResult<Option<Envelope>> {
            Ok(match id {
                1 => Some(env(1.0, 1.0, 2.0, 2.0)),
                2 => Some(env(5.0, 5.0, 15.0, 15.0)),
                _ => None,
            })
        };
        let within = refine(SpatialPredicate::Within, &calc, &query, vec![1, 2, 3], lookup).unwrap();
        assert_eq!(within, vec![1]);
    }

    #[test]
    fn test_refine_propagates_lookup_error() {
        let calc = DefaultCalculator;
        let query = env(0.0, 0.0, 1.0, 1.0);
        let result = refine(SpatialPredicate::Within, &calc, &query, vec![1], |_| {
            Err(TreeError::Mapper("gone".into()))
        });
        assert!(matches!(result, Err(TreeError::Mapper(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(SpatialPredicate::Within.to_string(), "within");
        assert_eq!(SpatialPredicate::Disjoint.to_string(), "disjoint");
    }
}
