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

//! Windowed DFT basis.
//!
//! The analysis operator is a sliding-window projection onto `2F` rows
//! (`F = n_fft/2 + 1`):
//!
//! ```text
//! basis[k][i]     =  w[i] * cos(2*pi*k*i / n_fft)    k in 0..F   (real part)
//! basis[F + k][i] = -w[i] * sin(2*pi*k*i / n_fft)    k in 0..F   (imaginary part)
//! ```
//!
//! The sign of the sine rows matches the `e^{-j*omega*t}` convention of an FFT,
//! so a projection against this matrix and a windowed FFT give the same
//! coefficients. Synthesis uses the transpose of the same matrix with the
//! Hermitian bin weights from [`synthesis_weights`], divided by `n_fft`.

use ndarray::Array2;

use crate::config::{StftConfig, WindowType, generate_window};
use crate::fft_backend::Sample;

/// Build the `(2F, n_fft)` analysis basis for `n_fft` and `window`.
pub fn dft_basis<T: Sample>(n_fft: usize, window: WindowType) -> Array2<T> {
    let freq_bins = n_fft / 2 + 1;
    let window: Vec<f64> = generate_window(window, n_fft);
    let two_pi = 2.0 * std::f64::consts::PI;

    Array2::from_shape_fn((2 * freq_bins, n_fft), |(row, i)| {
        let k = row % freq_bins;
        // Reduce k*i modulo n_fft so large products keep full phase precision
        let phi = two_pi * ((k * i) % n_fft) as f64 / n_fft as f64;
        let value = if row < freq_bins {
            window[i] * phi.cos()
        } else {
            -window[i] * phi.sin()
        };
        T::constant(value)
    })
}

/// Basis for an already validated config.
pub fn basis_for<T: Sample>(config: &StftConfig) -> Array2<T> {
    dft_basis(config.n_fft(), config.window())
}

/// Per-bin synthesis weights: 1 for DC and Nyquist, 2 elsewhere, over `n_fft`.
///
/// A one-sided spectrum stands in for both halves of the full spectrum, so the
/// bins that have a mirror image count twice.
pub fn synthesis_weights<T: Sample>(n_fft: usize) -> Vec<T> {
    let freq_bins = n_fft / 2 + 1;
    let n = n_fft as f64;
    (0..freq_bins)
        .map(|k| {
            let mirrored = k != 0 && !(n_fft % 2 == 0 && k == n_fft / 2);
            T::constant(if mirrored { 2.0 / n } else { 1.0 / n })
        })
        .collect()
}
