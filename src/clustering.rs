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

//! Deep-clustering losses on embeddings `V` of shape `(batch, TF, D)` and
//! one-hot labels `Y` of shape `(batch, TF, C)`.
//!
//! Both losses compare the affinity matrices `V V^T` and `Y Y^T` through the
//! small Gram matrices `V^T V`, `Y^T Y` and `V^T Y`, so the `TF x TF`
//! affinities are never formed.

use nalgebra::{DMatrix, RealField};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, ArrayView4, Axis, Zip};
use rayon::prelude::*;

use crate::error::{Error, Result, ensure_dim};
use crate::fft_backend::{Complex, Sample};

/// Added to the diagonals of `V^T V` and `Y^T Y` before inversion.
pub const REGULARIZATION: f64 = 1e-24;

fn check_pair<T: Sample>(embedding: &ArrayView3<T>, label: &ArrayView3<T>) -> Result<()> {
    ensure_dim("label batch", embedding.len_of(Axis(0)), label.len_of(Axis(0)))?;
    ensure_dim("label bins", embedding.len_of(Axis(1)), label.len_of(Axis(1)))?;
    Ok(())
}

fn squared_norm<T: Sample>(matrix: &Array2<T>) -> T {
    matrix.fold(T::zero(), |acc, &x| acc + x * x)
}

/// Sum of per-example values computed in parallel, accumulated in batch order.
fn batch_sum<T, F>(batch: usize, per_example: F) -> Result<T>
where
    T: Sample,
    F: Fn(usize) -> Result<T> + Sync,
{
    let values: Vec<T> = (0..batch)
        .into_par_iter()
        .map(|b| per_example(b))
        .collect::<Result<_>>()?;
    Ok(values.into_iter().fold(T::zero(), |acc, x| acc + x))
}

/// `sum_b ||V^T V||^2 + ||Y^T Y||^2 - 2 ||V^T Y||^2`.
pub fn loss_dc<T: Sample>(embedding: ArrayView3<T>, label: ArrayView3<T>) -> Result<T> {
    check_pair(&embedding, &label)?;
    let two = T::constant(2.0);

    batch_sum(embedding.len_of(Axis(0)), |b| {
        let v = embedding.index_axis(Axis(0), b);
        let y = label.index_axis(Axis(0), b);
        let vtv = v.t().dot(&v);
        let yty = y.t().dot(&y);
        let vty = v.t().dot(&y);
        Ok(squared_norm(&vtv) + squared_norm(&yty) - two * squared_norm(&vty))
    })
}

/// Whitened deep-clustering loss:
/// `B*D - trace(sum_b (V^T V)^-1 (V^T Y) (Y^T Y)^-1 (V^T Y)^T)`.
///
/// Fails with [`Error::SingularMatrix`] if a regularized Gram matrix still
/// cannot be inverted.
pub fn loss_dc_whitened<T>(embedding: ArrayView3<T>, label: ArrayView3<T>) -> Result<T>
where
    T: Sample + RealField,
{
    check_pair(&embedding, &label)?;
    let (batch, _, dim) = embedding.dim();

    let trace = batch_sum(batch, |b| {
        let v = embedding.index_axis(Axis(0), b);
        let y = label.index_axis(Axis(0), b);
        let vty = v.t().dot(&y);

        let whitened = regularized_inverse(v.t().dot(&v).view())?
            .dot(&vty)
            .dot(&regularized_inverse(y.t().dot(&y).view())?)
            .dot(&vty.t());
        Ok(whitened.diag().sum())
    })?;

    Ok(T::count(batch * dim) - trace)
}

/// Inverse of a Gram matrix after adding [`REGULARIZATION`] to its diagonal.
pub fn regularized_inverse<T>(gram: ArrayView2<T>) -> Result<Array2<T>>
where
    T: Sample + RealField,
{
    let size = gram.nrows();
    ensure_dim("square matrix columns", size, gram.ncols())?;

    let regularization = T::constant(REGULARIZATION);
    let matrix = DMatrix::from_row_iterator(
        size,
        size,
        gram.indexed_iter()
            .map(|((i, j), &x)| if i == j { x + regularization } else { x }),
    );
    let inverse = matrix
        .try_inverse()
        .ok_or(Error::SingularMatrix { size })?;

    Ok(Array2::from_shape_fn((size, size), |(i, j)| inverse[(i, j)]))
}

/// One-hot labels of the loudest source in every bin.
///
/// `sources` is `(batch, channels, F, N)`; the result is `(batch, F*N,
/// channels)` with row `f*N + n`. Ties go to the lowest channel index.
pub fn dominant_source_labels<T: Sample>(sources: ArrayView4<Complex<T>>) -> Array3<T> {
    let (batch, channels, freq_bins, num_frames) = sources.dim();
    let mut labels = Array3::zeros((batch, freq_bins * num_frames, channels));
    if channels == 0 {
        return labels;
    }

    Zip::from(labels.outer_iter_mut())
        .and(sources.outer_iter())
        .par_for_each(|mut label, source| {
            for f in 0..freq_bins {
                for n in 0..num_frames {
                    let mut best = 0;
                    let mut best_power = source[[0, f, n]].norm_sqr();
                    for c in 1..channels {
                        let power = source[[c, f, n]].norm_sqr();
                        if power > best_power {
                            best = c;
                            best_power = power;
                        }
                    }
                    label[[f * num_frames + n, best]] = T::one();
                }
            }
        });

    labels
}
