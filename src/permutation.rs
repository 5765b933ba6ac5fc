/*MIT License

Copyright (c) 2025 David Maseda Neira

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Permutation-invariant matching by exhaustive search.
//!
//! Orderings are enumerated in lexicographic order. An ordering `p` pairs
//! truth `j` with estimate `p[j]`; its cost is the sum of the pairwise costs
//! and the first ordering reaching the minimum wins. Search is `O(C!)` per
//! example, fine for the 2 to 4 channel case.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::error::{Result, ensure_dim};
use crate::fft_backend::Sample;

/// Above this many channels the search gets slow enough to warn about.
pub const MAX_EXHAUSTIVE_CHANNELS: usize = 8;

/// Lexicographic generator over the permutations of `0..n`.
#[derive(Debug, Clone)]
pub struct Permutations {
    current: Vec<usize>,
    done: bool,
}

impl Permutations {
    pub fn new(n: usize) -> Self {
        Self {
            current: (0..n).collect(),
            done: false,
        }
    }
}

impl Iterator for Permutations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.current.clone();

        // Next permutation: rightmost ascent, swap with the smallest larger
        // element to its right, reverse the tail
        let perm = &mut self.current;
        match (1..perm.len()).rev().find(|&i| perm[i - 1] < perm[i]) {
            Some(i) => {
                let pivot = i - 1;
                let mut j = perm.len() - 1;
                while perm[j] <= perm[pivot] {
                    j -= 1;
                }
                perm.swap(pivot, j);
                perm[i..].reverse();
            }
            None => self.done = true,
        }

        Some(item)
    }
}

/// Minimum total cost and the assignment that reaches it.
#[derive(Debug, Clone, PartialEq)]
pub struct Matching<T> {
    pub cost: T,

    /// `permutation[i]` is the truth index assigned to estimate `i`
    pub permutation: Vec<usize>,
}

impl<T> Matching<T> {
    /// Estimate index for each truth index, the inverse of `permutation`.
    pub fn ordering(&self) -> Vec<usize> {
        let mut ordering = vec![0; self.permutation.len()];
        for (estimate, &truth) in self.permutation.iter().enumerate() {
            ordering[truth] = estimate;
        }
        ordering
    }

    /// Reorder estimates so that position `j` holds the estimate matched to
    /// truth `j`.
    pub fn align<'a, E>(&self, estimates: &'a [E]) -> Vec<&'a E> {
        self.ordering().into_iter().map(|i| &estimates[i]).collect()
    }
}

fn warn_if_large(channels: usize) {
    if channels > MAX_EXHAUSTIVE_CHANNELS {
        log::warn!(
            "exhaustive permutation search over {} channels ({}! orderings)",
            channels,
            channels
        );
    }
}

/// Best matching for a `C x C` cost matrix, `cost_matrix[[i, j]]` being the
/// cost of estimate `i` against truth `j`.
pub fn best_permutation_cost<T: Sample>(cost_matrix: ArrayView2<T>) -> Result<Matching<T>> {
    let channels = cost_matrix.nrows();
    ensure_dim("cost matrix columns", channels, cost_matrix.ncols())?;
    warn_if_large(channels);

    let mut best: Option<(T, Vec<usize>)> = None;
    for p in Permutations::new(channels) {
        let cost = p
            .iter()
            .enumerate()
            .fold(T::zero(), |acc, (truth, &estimate)| {
                acc + cost_matrix[[estimate, truth]]
            });
        // Strict comparison keeps the first minimum
        if best.as_ref().is_none_or(|(best_cost, _)| cost < *best_cost) {
            best = Some((cost, p));
        }
    }

    let (cost, ordering) = best.unwrap_or_else(|| (T::zero(), Vec::new()));
    let mut permutation = vec![0; channels];
    for (truth, &estimate) in ordering.iter().enumerate() {
        permutation[estimate] = truth;
    }
    Ok(Matching { cost, permutation })
}

/// Pairwise costs between every estimate and truth, `[[i, j]] = cost(e_i, t_j)`.
pub fn cost_matrix<E, U, T, F>(estimates: &[E], truths: &[U], cost: F) -> Result<Array2<T>>
where
    T: Sample,
    F: Fn(&E, &U) -> T,
{
    ensure_dim("truth channels", estimates.len(), truths.len())?;
    Ok(Array2::from_shape_fn(
        (estimates.len(), truths.len()),
        |(i, j)| cost(&estimates[i], &truths[j]),
    ))
}

/// Best matching of `estimates` against `truths` under `cost`.
pub fn best_cost<E, U, T, F>(estimates: &[E], truths: &[U], cost: F) -> Result<Matching<T>>
where
    T: Sample,
    F: Fn(&E, &U) -> T,
{
    let matrix = cost_matrix(estimates, truths, cost)?;
    best_permutation_cost(matrix.view())
}

/// Best matching for each `C x C` matrix of a batch, matched in parallel.
pub fn best_permutation_cost_batch<T: Sample>(
    cost_matrices: &[Array2<T>],
) -> Result<Vec<Matching<T>>> {
    cost_matrices
        .par_iter()
        .map(|matrix| best_permutation_cost(matrix.view()))
        .collect()
}

/// Sum of per-example minima over a batch.
///
/// The sum is accumulated in batch order so results do not depend on the
/// thread count.
pub fn best_cost_batch<T: Sample>(cost_matrices: &[Array2<T>]) -> Result<T> {
    let matchings = best_permutation_cost_batch(cost_matrices)?;
    Ok(matchings
        .iter()
        .fold(T::zero(), |acc, matching| acc + matching.cost))
}
