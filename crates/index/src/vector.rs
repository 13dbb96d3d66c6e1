//! Flat nearest-neighbor search by L2 distance.

/// Euclidean distance between two vectors of equal length.
///
/// Callers guarantee equal dimensions; extra components of the longer vector
/// are ignored.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Positions of the `k` vectors closest to `query`, with their distances.
///
/// Ascending distance; ties keep insertion order (stable sort). NaN distances
/// sort last.
pub fn nearest_positions(vectors: &[Vec<f32>], query: &[f32], k: usize) -> Vec<(usize, f32)> {
    if k == 0 || vectors.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(pos, v)| (pos, l2_distance(v, query)))
        .collect();

    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_known_value() {
        assert!((l2_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let v = vec![0.3, -1.2, 7.0];
        assert_eq!(l2_distance(&v, &v), 0.0);
    }

    #[test]
    fn nearest_ranks_ascending() {
        let vectors = vec![vec![10.0, 0.0], vec![1.0, 0.0], vec![4.0, 0.0]];
        let hits = nearest_positions(&vectors, &[0.0, 0.0], 3);
        let order: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!(hits.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let vectors = vec![vec![1.0], vec![-1.0], vec![1.0]];
        let hits = nearest_positions(&vectors, &[0.0], 3);
        let order: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn k_bounds_results() {
        let vectors = vec![vec![1.0], vec![2.0]];
        assert_eq!(nearest_positions(&vectors, &[0.0], 1).len(), 1);
        assert_eq!(nearest_positions(&vectors, &[0.0], 10).len(), 2);
        assert!(nearest_positions(&vectors, &[0.0], 0).is_empty());
    }
}
