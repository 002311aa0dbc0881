//! Node split policies.

use serde::{Deserialize, Serialize};

use crate::calculator::GeometryCalculator;
use crate::envelope::Envelope;

/// How an overflowing node distributes its entries over two groups.
///
/// Both policies pick a seed pair, then hand out the remaining entries in
/// input order to the group whose boundary grows least, breaking ties toward
/// the group with fewer members. Once a group needs every remaining entry to
/// reach the minimum fill, it takes them all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitPolicy {
    /// Seeds are the two entries whose centers lie farthest apart.
    Linear,
    /// Seeds are the two entries that would waste the most area together.
    #[default]
    Quadratic,
}

impl SplitPolicy {
    /// Minimum group size for a node of the given fanout.
    pub fn min_fill(max_elements: usize) -> usize {
        (max_elements / 3).max(1)
    }

    /// Splits `entries` into two groups of indices, each holding at least
    /// `min_fill` entries (when there are enough to go around).
    pub fn split(
        &self,
        calculator: &dyn GeometryCalculator,
        entries: &[Envelope],
        min_fill: usize,
    ) -> (Vec<usize>, Vec<usize>) {
        match entries.len() {
            0 => return (Vec::new(), Vec::new()),
            1 => return (vec![0], Vec::new()),
            _ => {}
        }

        let (seed_a, seed_b) = match self {
            SplitPolicy::Linear => linear_seeds(calculator, entries),
            SplitPolicy::Quadratic => quadratic_seeds(calculator, entries),
        };

        let mut group_a = vec![seed_a];
        let mut group_b = vec![seed_b];
        let mut bound_a = entries[seed_a].clone();
        let mut bound_b = entries[seed_b].clone();

        let remaining: Vec<usize> = (0..entries.len())
            .filter(|&i| i != seed_a && i != seed_b)
            .collect();
        let total = remaining.len();

        for (taken, &index) in remaining.iter().enumerate() {
            let left = total - taken;
            let entry = &entries[index];

            let to_a = if min_fill.saturating_sub(group_a.len()) >= left {
                true
            } else if min_fill.saturating_sub(group_b.len()) >= left {
                false
            } else {
                let grow_a = calculator.enlargement(&bound_a, entry);
                let grow_b = calculator.enlargement(&bound_b, entry);
                if grow_a < grow_b {
                    true
                } else if grow_b < grow_a {
                    false
                } else {
                    group_a.len() <= group_b.len()
                }
            };

            if to_a {
                group_a.push(index);
                bound_a = calculator.union(&bound_a, entry);
            } else {
                group_b.push(index);
                bound_b = calculator.union(&bound_b, entry);
            }
        }

        (group_a, group_b)
    }
}

fn linear_seeds(calculator: &dyn GeometryCalculator, entries: &[Envelope]) -> (usize, usize) {
    let mut seeds = (0, 1);
    let mut farthest = f64::NEG_INFINITY;
    for i in 0..entries.len() {
        for j in i + 1..entries.len() {
            let distance = calculator.centroid_distance(&entries[i], &entries[j]);
            if distance > farthest {
                farthest = distance;
                seeds = (i, j);
            }
        }
    }
    seeds
}

fn quadratic_seeds(calculator: &dyn GeometryCalculator, entries: &[Envelope]) -> (usize, usize) {
    let mut seeds = (0, 1);
    let mut worst = f64::NEG_INFINITY;
    let mut worst_distance = f64::NEG_INFINITY;
    for i in 0..entries.len() {
        for j in i + 1..entries.len() {
            let (a, b) = (&entries[i], &entries[j]);
            let waste = calculator.area(&calculator.union(a, b)) - calculator.area(a) - calculator.area(b);
            // degenerate entries (points, segments) waste nothing; fall back to spread
            let distance = calculator.centroid_distance(a, b);
            if waste > worst || (waste == worst && distance > worst_distance) {
                worst = waste;
                worst_distance = distance;
                seeds = (i, j);
            }
        }
    }
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{union_all, DefaultCalculator};

    fn env(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope::from_2d(min_x, min_y, max_x, max_y).unwrap()
    }

    fn point(x: f64, y: f64) -> Envelope {
        Envelope::point(&[x, y]).unwrap()
    }

    fn assert_partition(groups: &(Vec<usize>, Vec<usize>), n: usize) {
        let mut all: Vec<usize> = groups.0.iter().chain(groups.1.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn test_min_fill() {
        assert_eq!(SplitPolicy::min_fill(2), 1);
        assert_eq!(SplitPolicy::min_fill(3), 1);
        assert_eq!(SplitPolicy::min_fill(8), 2);
        assert_eq!(SplitPolicy::min_fill(9), 3);
    }

    #[test]
    fn test_linear_separates_clusters() {
        let calc = DefaultCalculator;
        let entries = vec![
            point(0.0, 0.0),
            point(100.0, 100.0),
            point(1.0, 1.0),
            point(99.0, 99.0),
            point(0.5, 0.2),
        ];
        let groups = SplitPolicy::Linear.split(&calc, &entries, 1);
        assert_partition(&groups, entries.len());
        let (mut a, mut b) = groups;
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, vec![0, 2, 4]);
        assert_eq!(b, vec![1, 3]);
    }

    #[test]
    fn test_quadratic_separates_clusters() {
        let calc = DefaultCalculator;
        let entries = vec![
            env(0.0, 0.0, 1.0, 1.0),
            env(50.0, 50.0, 51.0, 51.0),
            env(0.5, 0.5, 2.0, 2.0),
            env(49.0, 49.0, 50.0, 50.0),
        ];
        let (a, b) = SplitPolicy::Quadratic.split(&calc, &entries, 1);
        let mut a = a;
        let mut b = b;
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, vec![0, 2]);
        assert_eq!(b, vec![1, 3]);
    }

    #[test]
    fn test_min_fill_forces_underfull_group() {
        let calc = DefaultCalculator;
        // everything except the far seed is close to the first seed
        let entries = vec![
            point(0.0, 0.0),
            point(0.1, 0.0),
            point(0.2, 0.0),
            point(0.3, 0.0),
            point(0.4, 0.0),
            point(0.5, 0.0),
            point(100.0, 0.0),
        ];
        let (a, b) = SplitPolicy::Linear.split(&calc, &entries, 3);
        assert!(a.len() >= 3);
        assert!(b.len() >= 3);
        assert_partition(&(a, b), entries.len());
    }

    #[test]
    fn test_groups_respect_fanout() {
        let calc = DefaultCalculator;
        for max in 2..10 {
            let entries: Vec<Envelope> = (0..=max).map(|i| point(i as f64, 0.0)).collect();
            for policy in [SplitPolicy::Linear, SplitPolicy::Quadratic] {
                let (a, b) = policy.split(&calc, &entries, SplitPolicy::min_fill(max));
                assert!(!a.is_empty() && a.len() <= max, "{:?} max {}", policy, max);
                assert!(!b.is_empty() && b.len() <= max, "{:?} max {}", policy, max);
            }
        }
    }

    #[test]
    fn test_split_preserves_union() {
        let calc = DefaultCalculator;
        let entries = vec![
            env(0.0, 0.0, 3.0, 1.0),
            env(10.0, 4.0, 12.0, 9.0),
            env(-2.0, 5.0, 0.0, 6.0),
            env(7.0, -3.0, 8.0, 2.0),
        ];
        let (a, b) = SplitPolicy::Quadratic.split(&calc, &entries, 1);
        let group_a: Vec<Envelope> = a.iter().map(|&i| entries[i].clone()).collect();
        let group_b: Vec<Envelope> = b.iter().map(|&i| entries[i].clone()).collect();
        let ua = union_all(&calc, &group_a).unwrap();
        let ub = union_all(&calc, &group_b).unwrap();
        assert_eq!(
            Some(calc.union(&ua, &ub)),
            union_all(&calc, &entries)
        );
    }
}
