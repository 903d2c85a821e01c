//! Brute-force nearest-neighbour primitives for manifold estimation
//!
//! Rows are processed in parallel with rayon. Every row's result depends only
//! on that row, so the output is identical for any thread count.

use crate::linalg::squared_distance;
use rayon::prelude::*;
use simet_core::{Embeddings, Error, Result};

/// Distance from each point to its k-th nearest neighbour within the same population
///
/// The point itself is excluded by index; exact duplicates of a point still
/// count as neighbours at distance zero. Needs at least `k + 1` points.
pub fn kth_neighbor_radii(points: &Embeddings, k: usize) -> Result<Vec<f64>> {
    if k == 0 {
        return Err(Error::config("k must be at least 1"));
    }
    let n = points.rows();
    if n < k + 1 {
        return Err(Error::insufficient_samples(
            format!("{k}-nearest-neighbour radii"),
            k + 1,
            n,
        ));
    }

    let radii = (0..n)
        .into_par_iter()
        .map(|i| {
            let row = points.row(i);
            let mut distances: Vec<f64> = (0..n)
                .filter(|&j| j != i)
                .map(|j| squared_distance(row, points.row(j)))
                .collect();
            let (_, kth, _) = distances.select_nth_unstable_by(k - 1, f64::total_cmp);
            kth.sqrt()
        })
        .collect();

    Ok(radii)
}

/// Fraction of `queries` that fall inside at least one reference hypersphere
///
/// Reference point `r` covers query `q` when `‖q − r‖ ≤ radii[r]`.
pub fn manifold_coverage(reference: &Embeddings, radii: &[f64], queries: &Embeddings) -> Result<f64> {
    if reference.rows() != radii.len() {
        return Err(Error::shape_mismatch(
            "manifold radii",
            reference.rows(),
            radii.len(),
        ));
    }
    if reference.dim() != queries.dim() {
        return Err(Error::shape_mismatch(
            "manifold populations",
            reference.dim(),
            queries.dim(),
        ));
    }
    if queries.is_empty() {
        return Err(Error::insufficient_samples("manifold coverage queries", 1, 0));
    }

    let squared_radii: Vec<f64> = radii.iter().map(|r| r * r).collect();

    let covered = (0..queries.rows())
        .into_par_iter()
        .filter(|&q| {
            let query = queries.row(q);
            (0..reference.rows())
                .any(|r| squared_distance(query, reference.row(r)) <= squared_radii[r])
        })
        .count();

    Ok(covered as f64 / queries.rows() as f64)
}
