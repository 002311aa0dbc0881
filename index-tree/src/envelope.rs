use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::rtree_types::{TreeError, TreeResult};

/// An axis-aligned bounding box over an n-dimensional Cartesian space.
///
/// Coordinates are laid out as `[min_0 .. min_{d-1}, max_0 .. max_{d-1}]`,
/// so a 2-D envelope is `[min_x, min_y, max_x, max_y]`. A validated envelope
/// never holds NaN and always satisfies `min_i <= max_i`.
///
/// # Examples
///
/// ```rust
/// use index_tree::Envelope;
///
/// let env = Envelope::from_2d(0.0, 0.0, 10.0, 5.0).unwrap();
/// assert_eq!(env.dimension(), 2);
/// assert_eq!(env.span(0), 10.0);
/// ```
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Envelope {
    coords: Vec<f64>,
}

impl TryFrom<Vec<f64>> for Envelope {
    type Error = TreeError;

    fn try_from(coords: Vec<f64>) -> TreeResult<Self> {
        Envelope::new(coords)
    }
}

impl From<Envelope> for Vec<f64> {
    fn from(envelope: Envelope) -> Self {
        envelope.coords
    }
}

impl Envelope {
    /// Creates an envelope from a `2 * dimension` coordinate array.
    ///
    /// Fails with [`TreeError::InvalidArgument`] when the array length is odd
    /// or zero, when a coordinate is NaN, or when `min_i > max_i`.
    pub fn new(coords: Vec<f64>) -> TreeResult<Envelope> {
        if coords.is_empty() || coords.len() % 2 != 0 {
            return Err(TreeError::InvalidArgument(format!(
                "Envelope needs 2 * dimension coordinates, got {}",
                coords.len()
            )));
        }
        if coords.iter().any(|c| c.is_nan()) {
            return Err(TreeError::InvalidArgument(format!(
                "Envelope contains NaN coordinate: {:?}",
                coords
            )));
        }
        let dim = coords.len() / 2;
        for i in 0..dim {
            if coords[i] > coords[i + dim] {
                return Err(TreeError::InvalidArgument(format!(
                    "Envelope is inverted on axis {}: min {} > max {}",
                    i,
                    coords[i],
                    coords[i + dim]
                )));
            }
        }
        Ok(Envelope { coords })
    }

    /// Creates a 2-D envelope.
    pub fn from_2d(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> TreeResult<Envelope> {
        Envelope::new(vec![min_x, min_y, max_x, max_y])
    }

    /// Creates a degenerate envelope covering a single point.
    pub fn point(position: &[f64]) -> TreeResult<Envelope> {
        let mut coords = Vec::with_capacity(position.len() * 2);
        coords.extend_from_slice(position);
        coords.extend_from_slice(position);
        Envelope::new(coords)
    }

    /// Builds an envelope from coordinates already known to be valid
    /// (results of union/intersection of valid envelopes).
    pub(crate) fn from_valid(coords: Vec<f64>) -> Envelope {
        debug_assert!(coords.len() % 2 == 0 && !coords.is_empty());
        Envelope { coords }
    }

    /// Number of axes.
    pub fn dimension(&self) -> usize {
        self.coords.len() / 2
    }

    /// Lower bound on `axis`.
    pub fn min(&self, axis: usize) -> f64 {
        self.coords[axis]
    }

    /// Upper bound on `axis`.
    pub fn max(&self, axis: usize) -> f64 {
        self.coords[axis + self.dimension()]
    }

    /// Extent along `axis`.
    pub fn span(&self, axis: usize) -> f64 {
        self.max(axis) - self.min(axis)
    }

    /// Midpoint along `axis`.
    pub fn median(&self, axis: usize) -> f64 {
        (self.min(axis) + self.max(axis)) / 2.0
    }

    /// Component-wise midpoint.
    pub fn center(&self) -> Vec<f64> {
        (0..self.dimension()).map(|i| self.median(i)).collect()
    }

    /// Raw coordinate array.
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Consumes the envelope and returns its coordinate array.
    pub fn into_coords(self) -> Vec<f64> {
        self.coords
    }

    /// True if every min equals its max.
    pub fn is_point(&self) -> bool {
        (0..self.dimension()).all(|i| self.min(i) == self.max(i))
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Envelope(")?;
        for (i, c) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

/// Descriptor of the coordinate space a tree indexes.
///
/// The tree never interprets it beyond its axis count; it is stored as an
/// opaque blob in the header of a paged file.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CoordinateSystem {
    name: String,
    axes: Vec<String>,
}

impl CoordinateSystem {
    pub fn new(name: impl Into<String>, axes: Vec<String>) -> TreeResult<CoordinateSystem> {
        if axes.is_empty() {
            return Err(TreeError::InvalidArgument(
                "Coordinate system needs at least one axis".into(),
            ));
        }
        Ok(CoordinateSystem {
            name: name.into(),
            axes,
        })
    }

    /// A generic Cartesian space with axes `x0 .. x{dimension-1}`.
    pub fn cartesian(dimension: usize) -> TreeResult<CoordinateSystem> {
        let axes = match dimension {
            2 => vec!["x".to_string(), "y".to_string()],
            3 => vec!["x".to_string(), "y".to_string(), "z".to_string()],
            d => (0..d).map(|i| format!("x{}", i)).collect(),
        };
        CoordinateSystem::new(format!("Cartesian {}D", dimension), axes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn axes(&self) -> &[String] {
        &self.axes
    }

    pub fn dimension(&self) -> usize {
        self.axes.len()
    }
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        CoordinateSystem {
            name: "Cartesian 2D".to_string(),
            axes: vec!["x".to_string(), "y".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RTree, TreeConfig};

    #[test]
    fn test_new_2d() {
        let env = Envelope::from_2d(1.0, 2.0, 3.0, 4.0).unwrap();
        assert_eq!(env.dimension(), 2);
        assert_eq!(env.min(0), 1.0);
        assert_eq!(env.min(1), 2.0);
        assert_eq!(env.max(0), 3.0);
        assert_eq!(env.max(1), 4.0);
    }

    #[test]
    fn test_rejects_nan() {
        let result = Envelope::from_2d(0.0, f64::NAN, 1.0, 1.0);
        assert!(matches!(result, Err(TreeError::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_inverted() {
        let result = Envelope::from_2d(10.0, 0.0, 0.0, 5.0);
        assert!(matches!(result, Err(TreeError::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_odd_length() {
        assert!(Envelope::new(vec![0.0, 1.0, 2.0]).is_err());
        assert!(Envelope::new(vec![]).is_err());
    }

    #[test]
    fn test_point() {
        let env = Envelope::point(&[3.0, 4.0, 5.0]).unwrap();
        assert_eq!(env.dimension(), 3);
        assert!(env.is_point());
        assert_eq!(env.coords(), &[3.0, 4.0, 5.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_span_and_center() {
        let env = Envelope::from_2d(-10.0, -5.0, 10.0, 5.0).unwrap();
        assert_eq!(env.span(0), 20.0);
        assert_eq!(env.span(1), 10.0);
        assert_eq!(env.center(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_display() {
        let env = Envelope::from_2d(1.0, 2.0, 3.0, 4.0).unwrap();
        assert_eq!(format!("{}", env), "Envelope(1, 2, 3, 4)");
    }

    #[test]
    fn test_serialization() {
        let env = Envelope::from_2d(1.5, 2.5, 3.5, 4.5).unwrap();
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(json, "[1.5,2.5,3.5,4.5]");
        let deserialized: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(env, deserialized);
    }

    #[test]
    fn test_deserialization_validates() {
        let inverted = serde_json::from_str::<Envelope>("[10.0,10.0,0.0,0.0]");
        assert!(inverted.unwrap_err().to_string().contains("inverted"));
        assert!(serde_json::from_str::<Envelope>("[0.0,1.0,2.0]").is_err());
        assert!(serde_json::from_str::<Envelope>("[]").is_err());

        // a rejected payload never becomes a tree entry
        let mut tree = RTree::in_memory(TreeConfig::default()).unwrap();
        if let Ok(env) = serde_json::from_str::<Envelope>("[5.0,0.0,1.0,3.0]") {
            tree.insert(1, env).unwrap();
        }
        assert!(tree.is_empty());
        assert!(tree.check_integrity().unwrap().is_valid);
    }

    #[test]
    fn test_cartesian_coordinate_system() {
        let cs = CoordinateSystem::cartesian(3).unwrap();
        assert_eq!(cs.dimension(), 3);
        assert_eq!(cs.axes()[2], "z");
        assert_eq!(CoordinateSystem::default().dimension(), 2);
        assert!(CoordinateSystem::cartesian(0).is_err());
    }
}
