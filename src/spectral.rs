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

//! Complex time-frequency helpers and masks.

use ndarray::{Array, Array4, ArrayView, Dimension, Ix4};

use crate::fft_backend::{Complex, Sample};

/// Floor on squared magnitudes before the square root, and on magnitudes
/// before phase normalization.
pub const MAGNITUDE_FLOOR: f64 = 1e-12;

/// `sqrt(max(re^2 + im^2, 1e-12))`
#[inline]
pub fn clamped_magnitude<T: Sample>(z: Complex<T>) -> T {
    z.norm_sqr().max(T::constant(MAGNITUDE_FLOOR)).sqrt()
}

/// Angle of `z` in radians, `atan2(im, re)`.
#[inline]
pub fn phase<T: Sample>(z: Complex<T>) -> T {
    z.im.atan2(z.re)
}

/// `z / max(|z|, 1e-12)`: unit phasor, or zero for a vanishing bin.
#[inline]
pub fn unit_phasor<T: Sample>(z: Complex<T>) -> Complex<T> {
    let norm = z.norm().max(T::constant(MAGNITUDE_FLOOR));
    Complex::new(z.re / norm, z.im / norm)
}

/// Complex product `(ac - bd, ad + bc)`.
#[inline]
pub fn complex_mul<T: Sample>(a: Complex<T>, b: Complex<T>) -> Complex<T> {
    Complex::new(a.re * b.re - a.im * b.im, a.re * b.im + a.im * b.re)
}

/// Unclamped `|z|` of every bin.
pub fn magnitudes<T: Sample, D: Dimension>(spectrum: ArrayView<Complex<T>, D>) -> Array<T, D> {
    spectrum.mapv(|z| z.norm())
}

pub fn clamped_magnitudes<T: Sample, D: Dimension>(
    spectrum: ArrayView<Complex<T>, D>,
) -> Array<T, D> {
    spectrum.mapv(clamped_magnitude)
}

pub fn phases<T: Sample, D: Dimension>(spectrum: ArrayView<Complex<T>, D>) -> Array<T, D> {
    spectrum.mapv(phase)
}

/// Multiplicative time-frequency mask of shape `(batch, channels, F, N)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Mask<T: Sample> {
    Real(Array4<T>),
    Complex(Array4<Complex<T>>),
}

impl<T: Sample> Mask<T> {
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        match self {
            Mask::Real(mask) => mask.dim(),
            Mask::Complex(mask) => mask.dim(),
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Mask::Real(_))
    }

    /// Complex view of the mask; a real mask gets a zero imaginary part.
    pub fn to_complex(&self) -> Array4<Complex<T>> {
        match self {
            Mask::Real(mask) => mask.mapv(|m| Complex::new(m, T::zero())),
            Mask::Complex(mask) => mask.clone(),
        }
    }

    pub fn into_complex(self) -> Array4<Complex<T>> {
        match self {
            Mask::Real(mask) => mask.mapv_into_any(|m| Complex::new(m, T::zero())),
            Mask::Complex(mask) => mask,
        }
    }
}

impl<T: Sample> From<Array4<T>> for Mask<T> {
    fn from(mask: Array4<T>) -> Self {
        Mask::Real(mask)
    }
}

impl<T: Sample> From<Array4<Complex<T>>> for Mask<T> {
    fn from(mask: Array4<Complex<T>>) -> Self {
        Mask::Complex(mask)
    }
}

impl<T: Sample> From<ArrayView<'_, T, Ix4>> for Mask<T> {
    fn from(mask: ArrayView<'_, T, Ix4>) -> Self {
        Mask::Real(mask.to_owned())
    }
}
