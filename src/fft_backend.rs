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

//! FFT backend
//!
//! Wraps rustfft plans behind a small type that owns the forward and inverse
//! plans for one transform size. Plans are `Arc`-shared so transforms can be
//! cloned cheaply and used from several rayon workers at once.

use std::fmt;
use std::sync::Arc;

use ndarray::ScalarOperand;
use num_traits::Float;
use rustfft::{Fft, FftPlanner};

pub use rustfft::num_complex::Complex;

/// Scalar types the crate computes with.
///
/// Implemented for `f32` and `f64`.
pub trait Sample:
    Float + rustfft::FftNum + ScalarOperand + Default + fmt::Display + Send + Sync + 'static
{
    /// Convert an `f64` constant into this type.
    #[inline]
    fn constant(value: f64) -> Self {
        <Self as num_traits::NumCast>::from(value).unwrap_or_else(Self::zero)
    }

    /// Convert a count into this type.
    #[inline]
    fn count(value: usize) -> Self {
        <Self as num_traits::NumCast>::from(value).unwrap_or_else(Self::zero)
    }
}

impl Sample for f32 {}
impl Sample for f64 {}

/// Forward and inverse FFT plans of one size.
#[derive(Clone)]
pub struct FftPlan<T: Sample> {
    forward: Arc<dyn Fft<T>>,
    inverse: Arc<dyn Fft<T>>,
}

impl<T: Sample> FftPlan<T> {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
        }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scratch buffer large enough for either direction.
    pub fn make_scratch(&self) -> Vec<Complex<T>> {
        let len = self
            .forward
            .get_inplace_scratch_len()
            .max(self.inverse.get_inplace_scratch_len());
        vec![Complex::new(T::zero(), T::zero()); len]
    }

    /// Unnormalized forward FFT in place.
    #[inline]
    pub fn forward(&self, buffer: &mut [Complex<T>], scratch: &mut [Complex<T>]) {
        self.forward.process_with_scratch(buffer, scratch);
    }

    /// Unnormalized inverse FFT in place.
    #[inline]
    pub fn inverse(&self, buffer: &mut [Complex<T>], scratch: &mut [Complex<T>]) {
        self.inverse.process_with_scratch(buffer, scratch);
    }
}

impl<T: Sample> fmt::Debug for FftPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftPlan").field("len", &self.len()).finish()
    }
}
