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

//! Permutation-invariant separation losses.
//!
//! Every loss builds a `C x C` matrix of summed elementwise distances between
//! estimate channel `i` and truth channel `j`, takes the best matching per
//! example and sums the minima over the batch. Nothing is averaged.
//!
//! Shapes:
//! * masks, sources, complex estimates: `(batch, channels, F, N)`
//! * mixture spectra: `(batch, F, N)`
//! * waveforms: `(batch, channels, T)`
//! * phase probabilities: `(batch, channels, F, N, K)`

use ndarray::{Array2, Array4, ArrayView3, ArrayView4, ArrayView5, Axis, Zip};
use num_traits::Float;
use rayon::prelude::*;

use crate::error::{Error, Result, ensure_dim};
use crate::fft_backend::{Complex, Sample};
use crate::permutation::best_cost_batch;
use crate::spectral::{
    MAGNITUDE_FLOOR, clamped_magnitude, clamped_magnitudes, complex_mul, phase,
};

/// Floor on probabilities before the logarithm in [`loss_ce_phase`].
pub const PROBABILITY_FLOOR: f64 = 1e-36;

/// Distance order for the magnitude and complex losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Norm {
    #[default]
    L1,
    L2,
}

impl Norm {
    #[inline]
    fn distance<T: Sample>(self, diff: T) -> T {
        match self {
            Norm::L1 => Float::abs(diff),
            Norm::L2 => diff * diff,
        }
    }
}

impl TryFrom<u32> for Norm {
    type Error = Error;

    fn try_from(order: u32) -> Result<Self> {
        match order {
            1 => Ok(Norm::L1),
            2 => Ok(Norm::L2),
            order => Err(Error::UnsupportedNorm { order }),
        }
    }
}

/// True phase for [`loss_ce_phase`], `(batch, channels, F, N)`.
#[derive(Debug, Clone, Copy)]
pub enum PhaseTarget<'a, T: Sample> {
    /// Complex values; the phase is taken with `atan2`
    Complex(ArrayView4<'a, Complex<T>>),
    Radians(ArrayView4<'a, T>),
}

impl<T: Sample> PhaseTarget<'_, T> {
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        match self {
            PhaseTarget::Complex(target) => target.dim(),
            PhaseTarget::Radians(target) => target.dim(),
        }
    }

    fn radians(&self) -> Array4<T> {
        match self {
            PhaseTarget::Complex(target) => target.mapv(phase),
            PhaseTarget::Radians(target) => target.to_owned(),
        }
    }
}

fn ensure_shape(what: &'static str, expected: &[usize], got: &[usize]) -> Result<()> {
    ensure_dim(what, expected.len(), got.len())?;
    for (&e, &g) in expected.iter().zip(got) {
        ensure_dim(what, e, g)?;
    }
    Ok(())
}

/// Per-example cost matrices built in parallel, matched, summed in batch order.
fn matched_sum<T, F>(batch: usize, channels: usize, pair_cost: F) -> Result<T>
where
    T: Sample,
    F: Fn(usize, usize, usize) -> T + Sync,
{
    let matrices: Vec<Array2<T>> = (0..batch)
        .into_par_iter()
        .map(|b| Array2::from_shape_fn((channels, channels), |(i, j)| pair_cost(b, i, j)))
        .collect();
    best_cost_batch(&matrices)
}

/// Check `(B, C, F, N)` estimates against sources and a `(B, F, N)` mixture.
fn check_spectral(estimate: &[usize], mixture: &[usize], sources: &[usize]) -> Result<()> {
    ensure_shape("sources shape", estimate, sources)?;
    ensure_dim("mixture batch", estimate[0], mixture[0])?;
    ensure_dim("mixture bins", estimate[2], mixture[1])?;
    ensure_dim("mixture frames", estimate[3], mixture[2])?;
    Ok(())
}

/// Mask approximation: `sum (mask * |X| - |S|)^2`.
pub fn loss_mi_msa<T: Sample>(
    mask: ArrayView4<T>,
    mixture: ArrayView3<Complex<T>>,
    sources: ArrayView4<Complex<T>>,
) -> Result<T> {
    check_spectral(mask.shape(), mixture.shape(), sources.shape())?;
    let (batch, channels, _, _) = mask.dim();

    let abs_x = clamped_magnitudes(mixture.view());
    let abs_s = clamped_magnitudes(sources.view());

    matched_sum(batch, channels, |b, i, j| {
        Zip::from(mask.index_axis(Axis(0), b).index_axis(Axis(0), i))
            .and(abs_x.index_axis(Axis(0), b))
            .and(abs_s.index_axis(Axis(0), b).index_axis(Axis(0), j))
            .fold(T::zero(), |acc, &m, &x, &s| {
                let diff = m * x - s;
                acc + diff * diff
            })
    })
}

/// Truncated phase-sensitive approximation.
///
/// The target is `min(max(|S| cos(phase_S - phase_X), 0), gamma * |X|)`.
pub fn loss_mi_tpsa<T: Sample>(
    mask: ArrayView4<T>,
    mixture: ArrayView3<Complex<T>>,
    sources: ArrayView4<Complex<T>>,
    gamma: T,
    norm: Norm,
) -> Result<T> {
    check_spectral(mask.shape(), mixture.shape(), sources.shape())?;
    let (batch, channels, _, _) = mask.dim();

    let abs_x = clamped_magnitudes(mixture.view());
    let mixture_b = mixture.insert_axis(Axis(1));
    let mut target = Array4::zeros(sources.raw_dim());
    Zip::from(&mut target)
        .and(&sources)
        .and_broadcast(&mixture_b)
        .for_each(|t, &s, &x| {
            let projected = clamped_magnitude(s) * (phase(s) - phase(x)).cos();
            *t = projected.max(T::zero()).min(gamma * clamped_magnitude(x));
        });

    matched_sum(batch, channels, |b, i, j| {
        Zip::from(mask.index_axis(Axis(0), b).index_axis(Axis(0), i))
            .and(abs_x.index_axis(Axis(0), b))
            .and(target.index_axis(Axis(0), b).index_axis(Axis(0), j))
            .fold(T::zero(), |acc, &m, &x, &t| acc + norm.distance(m * x - t))
    })
}

/// Waveform approximation: L1 distance between time-domain channels.
pub fn loss_wa<T: Sample>(predicted: ArrayView3<T>, truth: ArrayView3<T>) -> Result<T> {
    ensure_shape("waveform shape", predicted.shape(), truth.shape())?;
    let (batch, channels, _) = predicted.dim();

    matched_sum(batch, channels, |b, i, j| {
        Zip::from(predicted.index_axis(Axis(0), b).index_axis(Axis(0), i))
            .and(truth.index_axis(Axis(0), b).index_axis(Axis(0), j))
            .fold(T::zero(), |acc, &p, &t| acc + Float::abs(p - t))
    })
}

/// Complex spectrum approximation: distance between `com * X` and `S`.
///
/// L1 sums `|com * X - S|`, L2 sums its square, with the squared magnitude
/// floored at `1e-12` in both cases.
pub fn loss_csa<T: Sample>(
    com: ArrayView4<Complex<T>>,
    mixture: ArrayView3<Complex<T>>,
    sources: ArrayView4<Complex<T>>,
    norm: Norm,
) -> Result<T> {
    check_spectral(com.shape(), mixture.shape(), sources.shape())?;
    let (batch, channels, _, _) = com.dim();

    let mut estimate = Array4::zeros(com.raw_dim());
    Zip::from(&mut estimate)
        .and(&com)
        .and_broadcast(&mixture.insert_axis(Axis(1)))
        .for_each(|e, &c, &x| *e = complex_mul(c, x));

    let floor = T::constant(MAGNITUDE_FLOOR);
    matched_sum(batch, channels, |b, i, j| {
        Zip::from(estimate.index_axis(Axis(0), b).index_axis(Axis(0), i))
            .and(sources.index_axis(Axis(0), b).index_axis(Axis(0), j))
            .fold(T::zero(), |acc, &e, &s| {
                let residual = e - s;
                acc + match norm {
                    Norm::L1 => clamped_magnitude(residual),
                    Norm::L2 => residual.norm_sqr().max(floor),
                }
            })
    })
}

/// `x mod 2*pi` in `[0, 2*pi)`.
#[inline]
fn wrap_phase<T: Sample>(x: T) -> T {
    let two_pi = T::constant(std::f64::consts::TAU);
    x - two_pi * (x / two_pi).floor()
}

/// Index of the phasebook entry circularly nearest to `phase`; the first of
/// equally near entries wins.
pub fn nearest_phase_index<T: Sample>(phase: T, phasebook: &[T]) -> usize {
    let mut best = 0;
    let mut best_distance = T::infinity();
    for (k, &entry) in phasebook.iter().enumerate() {
        let distance = wrap_phase(entry - phase).min(wrap_phase(phase - entry));
        if distance < best_distance {
            best = k;
            best_distance = distance;
        }
    }
    best
}

/// Phasebook cross-entropy: `-ln(max(p[ref], 1e-36))` where `ref` is the
/// phasebook entry nearest the true phase.
pub fn loss_ce_phase<T: Sample>(
    probabilities: ArrayView5<T>,
    target: PhaseTarget<'_, T>,
    phasebook: &[T],
) -> Result<T> {
    if phasebook.is_empty() {
        return Err(Error::EmptyPhasebook);
    }
    let (batch, channels, freq_bins, num_frames, book_size) = probabilities.dim();
    ensure_dim("phasebook size", book_size, phasebook.len())?;
    ensure_shape(
        "phase target shape",
        &[batch, channels, freq_bins, num_frames],
        &<[usize; 4]>::from(target.dim()),
    )?;

    let reference = target.radians().mapv(|ph| nearest_phase_index(ph, phasebook));
    let floor = T::constant(PROBABILITY_FLOOR);

    matched_sum(batch, channels, |b, i, j| {
        let prob = probabilities.index_axis(Axis(0), b);
        let prob = prob.index_axis(Axis(0), i);
        Zip::from(prob.lanes(Axis(2)))
            .and(reference.index_axis(Axis(0), b).index_axis(Axis(0), j))
            .fold(T::zero(), |acc, lane, &k| acc - lane[k].max(floor).ln())
    })
}
