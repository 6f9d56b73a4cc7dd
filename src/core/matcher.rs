//! Nearest-match search over a [`Catalog`]
//!
//! Distances are mean squared differences; smaller means more similar. Every
//! search is an exhaustive scan in catalog insertion order, so the result is
//! exact and ties always resolve to the entry inserted first.

use std::cmp::Ordering;
use std::path::Path;

use crate::core::catalog::Catalog;
use crate::core::embeddings::Embedding;
use crate::error::{MatchError, Result};

/// A catalog entry paired with its distance to a query
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor<'a> {
    /// Identifier of the catalog entry
    pub id: &'a Path,
    /// Distance from the query
    pub distance: f32,
    /// Insertion position in the catalog
    pub position: usize,
}

/// Mean over components of `(a_i - b_i)^2`
pub fn distance(a: &Embedding, b: &Embedding) -> Result<f32> {
    if a.len() != b.len() {
        return Err(MatchError::DimensionMismatch {
            expected: a.len(),
            found: b.len(),
        });
    }
    let diff = a - b;
    Ok(diff.mapv(|x| x * x).mean().unwrap_or(0.0))
}

/// Identifier of the catalog entry closest to `query`
pub fn find_nearest<'a>(query: &Embedding, catalog: &'a Catalog) -> Result<&'a Path> {
    nearest(query, catalog).map(|n| n.id)
}

/// The catalog entry closest to `query`, with its distance
///
/// Fails with [`MatchError::EmptyCatalog`] when there is nothing to compare
/// against, and with [`MatchError::DimensionMismatch`] when any entry has a
/// different length than the query.
pub fn nearest<'a>(query: &Embedding, catalog: &'a Catalog) -> Result<Neighbor<'a>> {
    let mut best: Option<Neighbor<'a>> = None;

    for (position, entry) in catalog.iter().enumerate() {
        let d = distance(query, &entry.embedding)?;
        let closer = match &best {
            None => true,
            Some(current) => compare_distance(d, current.distance) == Ordering::Less,
        };
        if closer {
            best = Some(Neighbor {
                id: &entry.id,
                distance: d,
                position,
            });
        }
    }

    best.ok_or(MatchError::EmptyCatalog)
}

/// The `k` catalog entries closest to `query`, nearest first
///
/// Equal distances keep catalog insertion order, so the head of the list is
/// always what [`nearest`] returns.
pub fn rank<'a>(query: &Embedding, catalog: &'a Catalog, k: usize) -> Result<Vec<Neighbor<'a>>> {
    if catalog.is_empty() {
        return Err(MatchError::EmptyCatalog);
    }

    let mut neighbors = catalog
        .iter()
        .enumerate()
        .map(|(position, entry)| -> Result<Neighbor<'a>> {
            Ok(Neighbor {
                id: entry.id.as_path(),
                distance: distance(query, &entry.embedding)?,
                position,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Stable sort keeps insertion order among equal distances.
    neighbors.sort_by(|a, b| compare_distance(a.distance, b.distance));
    neighbors.truncate(k);
    Ok(neighbors)
}

/// Total order on distances with NaN after everything else
fn compare_distance(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array1};

    fn catalog<const N: usize>(entries: &[(&str, [f32; N])]) -> Catalog {
        let mut catalog = Catalog::new();
        for (id, values) in entries {
            catalog.insert(*id, Array1::from(values.to_vec())).unwrap();
        }
        catalog
    }

    #[test]
    fn test_distance_is_mean_squared_difference() {
        let a = arr1(&[0.0, 0.0]);
        let b = arr1(&[1.0, 3.0]);
        assert!((distance(&a, &b).unwrap() - 5.0).abs() < 1e-6);
        assert_eq!(distance(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn test_distance_dimension_mismatch() {
        let a = arr1(&[0.0, 0.0]);
        let b = arr1(&[0.0, 0.0, 0.0]);
        assert!(matches!(
            distance(&a, &b),
            Err(MatchError::DimensionMismatch { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn test_nearest_concrete_scenario() {
        let catalog = catalog(&[("a", [0.0, 0.0]), ("b", [1.0, 1.0]), ("c", [3.0, 3.0])]);
        let query = arr1(&[0.1, 0.1]);

        let best = nearest(&query, &catalog).unwrap();
        assert_eq!(best.id, Path::new("a"));
        assert!((best.distance - 0.01).abs() < 1e-6);
        assert_eq!(find_nearest(&query, &catalog).unwrap(), Path::new("a"));

        let ranked = rank(&query, &catalog, 3).unwrap();
        let distances: Vec<f32> = ranked.iter().map(|n| n.distance).collect();
        assert!((distances[1] - 0.81).abs() < 1e-5);
        assert!((distances[2] - 8.41).abs() < 1e-5);
    }

    #[test]
    fn test_nearest_is_minimal_over_all_entries() {
        let catalog = catalog(&[
            ("p", [5.0, -1.0, 2.0]),
            ("q", [0.5, 0.4, 0.3]),
            ("r", [-2.0, 2.0, 0.0]),
            ("s", [0.6, 0.2, 0.1]),
        ]);
        let query = arr1(&[0.5, 0.5, 0.5]);

        let best = nearest(&query, &catalog).unwrap();
        assert!(catalog.get(best.id).is_some());
        for entry in catalog.iter() {
            assert!(best.distance <= distance(&query, &entry.embedding).unwrap());
        }
    }

    #[test]
    fn test_nearest_is_deterministic() {
        let catalog = catalog(&[("x", [1.0]), ("y", [2.0]), ("z", [3.0])]);
        let query = arr1(&[2.2]);
        let first = find_nearest(&query, &catalog).unwrap();
        let second = find_nearest(&query, &catalog).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Path::new("y"));
    }

    #[test]
    fn test_ties_go_to_first_inserted() {
        let catalog = catalog(&[("late", [2.0]), ("early", [0.0]), ("other", [2.0])]);
        let query = arr1(&[1.0]);
        assert_eq!(find_nearest(&query, &catalog).unwrap(), Path::new("late"));

        let ranked = rank(&query, &catalog, 3).unwrap();
        let ids: Vec<&Path> = ranked.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![Path::new("late"), Path::new("early"), Path::new("other")]);
    }

    #[test]
    fn test_single_entry_always_wins() {
        let catalog = catalog(&[("only", [1000.0, -1000.0])]);
        let query = arr1(&[0.0, 0.0]);
        assert_eq!(find_nearest(&query, &catalog).unwrap(), Path::new("only"));
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog::new();
        let query = arr1(&[0.0]);
        assert!(matches!(find_nearest(&query, &catalog), Err(MatchError::EmptyCatalog)));
        assert!(matches!(rank(&query, &catalog, 1), Err(MatchError::EmptyCatalog)));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let catalog = catalog(&[("a", [0.0, 0.0]), ("b", [1.0, 1.0])]);
        let query = arr1(&[0.0, 0.0, 0.0]);
        assert!(matches!(
            find_nearest(&query, &catalog),
            Err(MatchError::DimensionMismatch { expected: 3, found: 2 })
        ));
        assert!(matches!(
            rank(&query, &catalog, 1),
            Err(MatchError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_rank_respects_k() {
        let catalog = catalog(&[("a", [0.0]), ("b", [1.0]), ("c", [2.0])]);
        let query = arr1(&[1.9]);

        let ranked = rank(&query, &catalog, 2).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, Path::new("c"));
        assert_eq!(ranked[0].position, 2);
        assert_eq!(ranked[1].id, Path::new("b"));

        assert_eq!(rank(&query, &catalog, 10).unwrap().len(), 3);
        assert!(rank(&query, &catalog, 0).unwrap().is_empty());
    }

    #[test]
    fn test_nan_distances_rank_last() {
        let catalog = catalog(&[("broken", [f32::NAN]), ("fine", [4.0])]);
        let query = arr1(&[0.0]);
        assert_eq!(find_nearest(&query, &catalog).unwrap(), Path::new("fine"));

        let ranked = rank(&query, &catalog, 2).unwrap();
        assert_eq!(ranked[1].id, Path::new("broken"));
    }
}
