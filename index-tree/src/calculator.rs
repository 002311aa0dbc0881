//! Geometry calculations used by the tree for insertion, split and search
//! decisions.
//!
//! All operations are pure: inputs are borrowed and never mutated, results are
//! fresh envelopes or scalars. Both envelopes passed to a binary operation must
//! share the same dimension; the tree guarantees this by rejecting entries of
//! the wrong dimension at insertion.

use std::fmt::Debug;

use crate::envelope::Envelope;
use crate::tree::rtree_types::{TreeError, TreeResult};

/// Geometry operations over envelopes.
///
/// Every method has a default Cartesian implementation; a custom calculator
/// only overrides what it needs (a geodesic area, for instance).
pub trait GeometryCalculator: Send + Sync + Debug {
    /// Area (volume for `d > 2`): product of the spans on every axis.
    fn area(&self, env: &Envelope) -> f64 {
        (0..env.dimension()).map(|i| env.span(i)).product()
    }

    /// Perimeter of a 2-D envelope. Rejected for any other dimension.
    fn perimeter(&self, env: &Envelope) -> TreeResult<f64> {
        if env.dimension() != 2 {
            return Err(TreeError::InvalidArgument(format!(
                "Perimeter is only defined for 2 dimensions, got {}",
                env.dimension()
            )));
        }
        Ok(2.0 * (env.span(0) + env.span(1)))
    }

    /// Smallest envelope covering both inputs.
    fn union(&self, a: &Envelope, b: &Envelope) -> Envelope {
        let dim = a.dimension();
        let mut coords = Vec::with_capacity(dim * 2);
        coords.extend((0..dim).map(|i| a.min(i).min(b.min(i))));
        coords.extend((0..dim).map(|i| a.max(i).max(b.max(i))));
        Envelope::from_valid(coords)
    }

    /// Growth of `a`'s area when it is extended to cover `b`.
    fn enlargement(&self, a: &Envelope, b: &Envelope) -> f64 {
        self.area(&self.union(a, b)) - self.area(a)
    }

    /// Common region of both inputs, `None` when they are disjoint.
    fn intersection(&self, a: &Envelope, b: &Envelope) -> Option<Envelope> {
        if !self.intersects(a, b, true) {
            return None;
        }
        let dim = a.dimension();
        let mut coords = Vec::with_capacity(dim * 2);
        coords.extend((0..dim).map(|i| a.min(i).max(b.min(i))));
        coords.extend((0..dim).map(|i| a.max(i).min(b.max(i))));
        Some(Envelope::from_valid(coords))
    }

    /// Area of the intersection, 0 when disjoint.
    fn overlap(&self, a: &Envelope, b: &Envelope) -> f64 {
        self.intersection(a, b)
            .map(|inter| self.area(&inter))
            .unwrap_or(0.0)
    }

    /// Whether the envelopes share any point. With `edge_inclusive` false,
    /// contact along a boundary does not count.
    fn intersects(&self, a: &Envelope, b: &Envelope, edge_inclusive: bool) -> bool {
        (0..a.dimension()).all(|i| {
            if edge_inclusive {
                a.min(i) <= b.max(i) && a.max(i) >= b.min(i)
            } else {
                a.min(i) < b.max(i) && a.max(i) > b.min(i)
            }
        })
    }

    /// Whether `outer` covers `inner`. With `edge_inclusive` false, `inner`
    /// must lie strictly inside `outer` on every axis.
    fn contains(&self, outer: &Envelope, inner: &Envelope, edge_inclusive: bool) -> bool {
        (0..outer.dimension()).all(|i| {
            if edge_inclusive {
                outer.min(i) <= inner.min(i) && outer.max(i) >= inner.max(i)
            } else {
                outer.min(i) < inner.min(i) && outer.max(i) > inner.max(i)
            }
        })
    }

    /// Boundary-only contact: the envelopes meet but their interiors do not.
    fn touches(&self, a: &Envelope, b: &Envelope) -> bool {
        self.intersects(a, b, true) && !self.intersects(a, b, false)
    }

    /// Coordinate-wise equality.
    fn equals(&self, a: &Envelope, b: &Envelope) -> bool {
        a.coords() == b.coords()
    }

    /// Interiors intersect and neither envelope covers the other.
    fn overlaps(&self, a: &Envelope, b: &Envelope) -> bool {
        self.intersects(a, b, false) && !self.contains(a, b, true) && !self.contains(b, a, true)
    }

    /// Euclidean distance between the midpoints of both envelopes.
    fn centroid_distance(&self, a: &Envelope, b: &Envelope) -> f64 {
        (0..a.dimension())
            .map(|i| {
                let d = a.median(i) - b.median(i);
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }
}

/// Cartesian calculator using the default implementations.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCalculator;

impl GeometryCalculator for DefaultCalculator {}

/// Union of all envelopes in `envelopes`, `None` when it is empty.
pub(crate) fn union_all<'a, I>(calculator: &dyn GeometryCalculator, envelopes: I) -> Option<Envelope>
where
    I: IntoIterator<Item = &'a Envelope>,
{
    envelopes.into_iter().fold(None, |acc, env| match acc {
        None => Some(env.clone()),
        Some(current) => Some(calculator.union(&current, env)),
    })
}
