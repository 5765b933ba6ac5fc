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

//! Error types shared by every module of the crate.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// FFT size is zero
    #[error("Invalid FFT size: {n_fft}")]
    InvalidFftSize { n_fft: usize },

    /// Hop is not exactly a quarter of the FFT size
    #[error("Invalid hop ratio: n_fft={n_fft}, hop={hop} (hop must be n_fft/4)")]
    InvalidHopRatio { n_fft: usize, hop: usize },

    /// Window energy vanishes somewhere in the steady-state region
    #[error("NOLA condition violated: min_energy={min_energy} < threshold={threshold}")]
    NolaViolation { min_energy: f64, threshold: f64 },

    /// Two tensors disagree on an axis
    #[error("Dimension mismatch in {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Distance order outside {1, 2}
    #[error("Unsupported norm order L{order} (only L1 and L2 are supported)")]
    UnsupportedNorm { order: u32 },

    /// Matrix could not be inverted even after regularization
    #[error("Singular {size}x{size} matrix")]
    SingularMatrix { size: usize },

    #[error("Phasebook is empty")]
    EmptyPhasebook,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fail with [`Error::DimensionMismatch`] unless `got == expected`.
#[inline]
pub(crate) fn ensure_dim(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::DimensionMismatch {
            what,
            expected,
            got,
        });
    }
    Ok(())
}
