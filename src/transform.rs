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

//! Sliding-window transform pair.
//!
//! Padding convention, shared by both directions: a waveform of `T` samples is
//! zero-padded by `2 * hop` samples on each side and framed every `hop`
//! samples, giving `floor(T / hop) + 1` frames. The inverse overlap-adds the
//! windowed frames, divides by the accumulated squared window and drops the
//! padding again.
//!
//! A [`BasisMode::Fixed`] transform evaluates the projection with an FFT. A
//! [`BasisMode::Trainable`] transform owns an explicit copy of the basis from
//! [`crate::basis`] and evaluates a matrix product against it; freshly built,
//! both modes produce the same coefficients.

use std::borrow::Cow;

use ndarray::{
    Array2, Array3, Array4, ArrayView1, ArrayView2, ArrayView3, ArrayView4, Axis, Zip, s,
};

use crate::basis::{basis_for, synthesis_weights};
use crate::config::{BasisMode, ENERGY_THRESHOLD, StftConfig};
use crate::error::{Error, Result, ensure_dim};
use crate::fft_backend::{Complex, FftPlan, Sample};
use crate::simd;

#[derive(Clone, Debug)]
enum Projection<T: Sample> {
    Fft(FftPlan<T>),
    Matrix(Array2<T>),
}

impl<T: Sample> Projection<T> {
    fn new(config: &StftConfig, mode: BasisMode) -> Self {
        match mode {
            BasisMode::Fixed => Projection::Fft(FftPlan::new(config.n_fft())),
            BasisMode::Trainable => Projection::Matrix(basis_for(config)),
        }
    }

    fn mode(&self) -> BasisMode {
        match self {
            Projection::Fft(_) => BasisMode::Fixed,
            Projection::Matrix(_) => BasisMode::Trainable,
        }
    }

    fn basis(&self, config: &StftConfig) -> Cow<'_, Array2<T>> {
        match self {
            Projection::Fft(_) => Cow::Owned(basis_for(config)),
            Projection::Matrix(basis) => Cow::Borrowed(basis),
        }
    }

    fn basis_mut(&mut self) -> Option<&mut Array2<T>> {
        match self {
            Projection::Fft(_) => None,
            Projection::Matrix(basis) => Some(basis),
        }
    }

    fn set_basis(&mut self, config: &StftConfig, basis: Array2<T>) -> Result<()> {
        ensure_dim("basis rows", 2 * config.freq_bins(), basis.nrows())?;
        ensure_dim("basis columns", config.n_fft(), basis.ncols())?;
        *self = Projection::Matrix(basis);
        Ok(())
    }
}

/// Forward transform: waveform to `(F, N)` complex frames.
#[derive(Clone, Debug)]
pub struct Transform<T: Sample> {
    config: StftConfig,
    window: Vec<T>,
    projection: Projection<T>,
}

impl<T: Sample> Transform<T> {
    /// FFT-backed transform with the fixed basis.
    pub fn new(config: StftConfig) -> Self {
        Self::with_mode(config, BasisMode::Fixed)
    }

    /// Matrix-backed transform seeded with the fixed basis.
    pub fn trainable(config: StftConfig) -> Self {
        Self::with_mode(config, BasisMode::Trainable)
    }

    pub fn with_mode(config: StftConfig, mode: BasisMode) -> Self {
        log::debug!(
            "building forward transform: n_fft={}, hop={}, window={:?}, mode={:?}",
            config.n_fft(),
            config.hop_size(),
            config.window(),
            mode
        );
        Self {
            config,
            window: config.generate_window(),
            projection: Projection::new(&config, mode),
        }
    }

    pub fn config(&self) -> &StftConfig {
        &self.config
    }

    pub fn mode(&self) -> BasisMode {
        self.projection.mode()
    }

    /// The `(2F, n_fft)` analysis basis in effect.
    pub fn basis(&self) -> Cow<'_, Array2<T>> {
        self.projection.basis(&self.config)
    }

    /// Mutable basis of a trainable transform, `None` for a fixed one.
    pub fn basis_mut(&mut self) -> Option<&mut Array2<T>> {
        self.projection.basis_mut()
    }

    /// Replace the basis; the transform becomes trainable.
    pub fn set_basis(&mut self, basis: Array2<T>) -> Result<()> {
        self.projection.set_basis(&self.config, basis)
    }

    pub fn process(&self, signal: &[T]) -> Array2<Complex<T>> {
        self.process_view(ArrayView1::from(signal))
    }

    pub fn process_view(&self, signal: ArrayView1<T>) -> Array2<Complex<T>> {
        let n_fft = self.config.n_fft();
        let hop = self.config.hop_size();
        let pad = self.config.padding();
        let freq_bins = self.config.freq_bins();
        let num_frames = self.config.num_frames(signal.len());

        let mut padded = vec![T::zero(); signal.len() + 2 * pad];
        for (dst, &src) in padded[pad..pad + signal.len()].iter_mut().zip(signal.iter()) {
            *dst = src;
        }

        let mut result = Array2::zeros((freq_bins, num_frames));

        match &self.projection {
            Projection::Fft(plan) => {
                let mut frame = vec![T::zero(); n_fft];
                let mut fft_buffer = vec![Complex::new(T::zero(), T::zero()); n_fft];
                let mut scratch = plan.make_scratch();

                for frame_idx in 0..num_frames {
                    let start = frame_idx * hop;
                    simd::apply_window(&padded[start..start + n_fft], &self.window, &mut frame);
                    for (dst, &x) in fft_buffer.iter_mut().zip(frame.iter()) {
                        *dst = Complex::new(x, T::zero());
                    }

                    plan.forward(&mut fft_buffer, &mut scratch);

                    // Positive frequencies only
                    for (dst, &z) in result
                        .column_mut(frame_idx)
                        .iter_mut()
                        .zip(fft_buffer[..freq_bins].iter())
                    {
                        *dst = z;
                    }
                }
            }
            Projection::Matrix(basis) => {
                let frames = Array2::from_shape_fn((n_fft, num_frames), |(i, frame_idx)| {
                    padded[frame_idx * hop + i]
                });
                let coeffs = basis.dot(&frames);

                Zip::from(&mut result)
                    .and(coeffs.slice(s![..freq_bins, ..]))
                    .and(coeffs.slice(s![freq_bins.., ..]))
                    .for_each(|z, &re, &im| *z = Complex::new(re, im));
            }
        }

        result
    }

    /// `(batch, T)` waveforms to `(batch, F, N)` frames.
    pub fn process_batch(&self, signals: ArrayView2<T>) -> Array3<Complex<T>> {
        let (batch, len) = signals.dim();
        let mut output = Array3::zeros((
            batch,
            self.config.freq_bins(),
            self.config.num_frames(len),
        ));

        Zip::from(output.outer_iter_mut())
            .and(signals.outer_iter())
            .par_for_each(|mut out, signal| out.assign(&self.process_view(signal)));

        output
    }

    /// `(batch, channels, T)` waveforms to `(batch, channels, F, N)` frames.
    pub fn process_channels(&self, signals: ArrayView3<T>) -> Array4<Complex<T>> {
        let (batch, channels, len) = signals.dim();
        let mut output = Array4::zeros((
            batch,
            channels,
            self.config.freq_bins(),
            self.config.num_frames(len),
        ));

        Zip::from(output.outer_iter_mut())
            .and(signals.outer_iter())
            .par_for_each(|mut out, example| {
                for (mut out_c, signal) in out.outer_iter_mut().zip(example.outer_iter()) {
                    out_c.assign(&self.process_view(signal));
                }
            });

        output
    }
}

/// Inverse transform: `(F, N)` complex frames back to a waveform.
#[derive(Clone, Debug)]
pub struct InverseTransform<T: Sample> {
    config: StftConfig,
    window: Vec<T>,
    projection: Projection<T>,
}

impl<T: Sample> InverseTransform<T> {
    pub fn new(config: StftConfig) -> Self {
        Self::with_mode(config, BasisMode::Fixed)
    }

    pub fn trainable(config: StftConfig) -> Self {
        Self::with_mode(config, BasisMode::Trainable)
    }

    pub fn with_mode(config: StftConfig, mode: BasisMode) -> Self {
        log::debug!(
            "building inverse transform: n_fft={}, hop={}, window={:?}, mode={:?}",
            config.n_fft(),
            config.hop_size(),
            config.window(),
            mode
        );
        Self {
            config,
            window: config.generate_window(),
            projection: Projection::new(&config, mode),
        }
    }

    pub fn config(&self) -> &StftConfig {
        &self.config
    }

    pub fn mode(&self) -> BasisMode {
        self.projection.mode()
    }

    pub fn basis(&self) -> Cow<'_, Array2<T>> {
        self.projection.basis(&self.config)
    }

    pub fn basis_mut(&mut self) -> Option<&mut Array2<T>> {
        self.projection.basis_mut()
    }

    pub fn set_basis(&mut self, basis: Array2<T>) -> Result<()> {
        self.projection.set_basis(&self.config, basis)
    }

    /// Reconstruct `(N - 1) * hop` samples.
    pub fn process(&self, spectrum: ArrayView2<Complex<T>>) -> Result<Vec<T>> {
        let length = self.config.output_len(spectrum.ncols());
        self.process_with_length(spectrum, length)
    }

    /// Reconstruct exactly `length` samples.
    pub fn process_with_length(
        &self,
        spectrum: ArrayView2<Complex<T>>,
        length: usize,
    ) -> Result<Vec<T>> {
        self.check(spectrum.nrows(), spectrum.ncols(), length)?;
        Ok(self.synthesize(spectrum, length))
    }

    pub fn process_batch(&self, spectra: ArrayView3<Complex<T>>) -> Result<Array2<T>> {
        let length = self.config.output_len(spectra.len_of(Axis(2)));
        self.process_batch_with_length(spectra, length)
    }

    /// `(batch, F, N)` frames to `(batch, length)` waveforms.
    pub fn process_batch_with_length(
        &self,
        spectra: ArrayView3<Complex<T>>,
        length: usize,
    ) -> Result<Array2<T>> {
        let (batch, freq_bins, num_frames) = spectra.dim();
        self.check(freq_bins, num_frames, length)?;

        let mut output = Array2::zeros((batch, length));
        Zip::from(output.outer_iter_mut())
            .and(spectra.outer_iter())
            .par_for_each(|mut out, spectrum| {
                out.assign(&ArrayView1::from(&self.synthesize(spectrum, length)[..]));
            });

        Ok(output)
    }

    pub fn process_channels(&self, spectra: ArrayView4<Complex<T>>) -> Result<Array3<T>> {
        let length = self.config.output_len(spectra.len_of(Axis(3)));
        self.process_channels_with_length(spectra, length)
    }

    /// `(batch, channels, F, N)` frames to `(batch, channels, length)` waveforms.
    pub fn process_channels_with_length(
        &self,
        spectra: ArrayView4<Complex<T>>,
        length: usize,
    ) -> Result<Array3<T>> {
        let (batch, channels, freq_bins, num_frames) = spectra.dim();
        self.check(freq_bins, num_frames, length)?;

        let mut output = Array3::zeros((batch, channels, length));
        Zip::from(output.outer_iter_mut())
            .and(spectra.outer_iter())
            .par_for_each(|mut out, example| {
                for (mut out_c, spectrum) in out.outer_iter_mut().zip(example.outer_iter()) {
                    out_c.assign(&ArrayView1::from(&self.synthesize(spectrum, length)[..]));
                }
            });

        Ok(output)
    }

    pub(crate) fn check(&self, freq_bins: usize, num_frames: usize, length: usize) -> Result<()> {
        ensure_dim("frequency bins", self.config.freq_bins(), freq_bins)?;
        let max_len = self.config.max_output_len(num_frames);
        if length > max_len {
            return Err(Error::DimensionMismatch {
                what: "waveform length",
                expected: max_len,
                got: length,
            });
        }
        Ok(())
    }

    /// Overlap-add synthesis of an already validated spectrum.
    pub(crate) fn synthesize(&self, spectrum: ArrayView2<Complex<T>>, length: usize) -> Vec<T> {
        let n_fft = self.config.n_fft();
        let hop = self.config.hop_size();
        let pad = self.config.padding();
        let (freq_bins, num_frames) = spectrum.dim();

        if num_frames == 0 {
            return vec![T::zero(); length];
        }

        let padded_len = (num_frames - 1) * hop + n_fft;
        let mut overlap_buffer = vec![T::zero(); padded_len];
        let mut window_energy = vec![T::zero(); padded_len];

        match &self.projection {
            Projection::Fft(plan) => {
                let scale = T::one() / T::count(n_fft);
                let mut ifft_buffer = vec![Complex::new(T::zero(), T::zero()); n_fft];
                let mut frame = vec![T::zero(); n_fft];
                let mut scratch = plan.make_scratch();

                for frame_idx in 0..num_frames {
                    for (dst, &z) in ifft_buffer.iter_mut().zip(spectrum.column(frame_idx)) {
                        *dst = z;
                    }

                    // Conjugate symmetry for negative frequencies (skip DC and Nyquist)
                    for bin in 1..(freq_bins - 1) {
                        ifft_buffer[n_fft - bin] = ifft_buffer[bin].conj();
                    }

                    plan.inverse(&mut ifft_buffer, &mut scratch);

                    for (dst, z) in frame.iter_mut().zip(ifft_buffer.iter()) {
                        *dst = z.re;
                    }

                    let pos = frame_idx * hop;
                    simd::overlap_add(
                        &frame,
                        &self.window,
                        scale,
                        &mut overlap_buffer[pos..pos + n_fft],
                    );
                }
            }
            Projection::Matrix(basis) => {
                let weights: Vec<T> = synthesis_weights(n_fft);
                let coeffs = Array2::from_shape_fn((2 * freq_bins, num_frames), |(row, n)| {
                    let bin = row % freq_bins;
                    let z = spectrum[[bin, n]];
                    let part = if row < freq_bins { z.re } else { z.im };
                    part * weights[bin]
                });
                let frames = basis.t().dot(&coeffs);

                for (frame_idx, frame) in frames.axis_iter(Axis(1)).enumerate() {
                    let pos = frame_idx * hop;
                    for (dst, &x) in overlap_buffer[pos..pos + n_fft].iter_mut().zip(frame.iter()) {
                        *dst = *dst + x;
                    }
                }
            }
        }

        for frame_idx in 0..num_frames {
            let pos = frame_idx * hop;
            simd::accumulate_squared(&self.window, &mut window_energy[pos..pos + n_fft]);
        }

        simd::divide_with_threshold(
            &mut overlap_buffer,
            &window_energy,
            T::constant(ENERGY_THRESHOLD),
        );

        // Remove padding
        overlap_buffer[pad..pad + length].to_vec()
    }
}

/// Forward and inverse transform sharing one config and mode.
#[derive(Clone, Debug)]
pub struct TransformPair<T: Sample> {
    pub forward: Transform<T>,
    pub inverse: InverseTransform<T>,
}

impl<T: Sample> TransformPair<T> {
    pub fn new(config: StftConfig, mode: BasisMode) -> Self {
        Self {
            forward: Transform::with_mode(config, mode),
            inverse: InverseTransform::with_mode(config, mode),
        }
    }

    pub fn config(&self) -> &StftConfig {
        self.forward.config()
    }
}

/// Transform one waveform with a fixed basis.
///
/// Plans the FFT on every call; hold a [`Transform`] when transforming
/// repeatedly.
pub fn transform<T: Sample>(waveform: &[T], config: &StftConfig) -> Array2<Complex<T>> {
    Transform::new(*config).process(waveform)
}

/// Invert one `(F, N)` spectrum with a fixed basis.
pub fn inverse<T: Sample>(frame: ArrayView2<Complex<T>>, config: &StftConfig) -> Result<Vec<T>> {
    InverseTransform::new(*config).process(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowType;

    fn test_signal(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (i as f64 * 0.05).sin() + 0.3 * (i as f64 * 0.21).cos())
            .collect()
    }

    #[test]
    fn test_frame_count_and_bins() {
        let config = StftConfig::default_256();
        let stft = Transform::<f64>::new(config);
        let spectrum = stft.process(&test_signal(64 * 20));
        assert_eq!(spectrum.dim(), (129, 21));
    }

    #[test]
    fn test_fixed_roundtrip() {
        let config = StftConfig::default_256();
        let pair = TransformPair::<f64>::new(config, BasisMode::Fixed);
        let original = test_signal(64 * 30);

        let spectrum = pair.forward.process(&original);
        let reconstructed = pair.inverse.process(spectrum.view()).unwrap();

        assert_eq!(reconstructed.len(), original.len());
        for (a, b) in original.iter().zip(reconstructed.iter()) {
            assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_matrix_matches_fft() {
        let config = StftConfig::new(64, WindowType::Hann).unwrap();
        let fixed = Transform::<f64>::new(config);
        let trainable = Transform::<f64>::trainable(config);
        let signal = test_signal(16 * 12);

        let a = fixed.process(&signal);
        let b = trainable.process(&signal);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).norm() < 1e-9);
        }

        let inv_fixed = InverseTransform::<f64>::new(config);
        let inv_trainable = InverseTransform::<f64>::trainable(config);
        let wa = inv_fixed.process(a.view()).unwrap();
        let wb = inv_trainable.process(a.view()).unwrap();
        for (x, y) in wa.iter().zip(wb.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_basis_access() {
        let config = StftConfig::new(32, WindowType::Hann).unwrap();
        let mut fixed = Transform::<f32>::new(config);
        assert!(fixed.basis_mut().is_none());
        assert_eq!(fixed.basis().dim(), (34, 32));

        let mut trainable = Transform::<f32>::trainable(config);
        let basis = trainable.basis_mut().unwrap();
        basis.fill(0.0);
        let spectrum = trainable.process(&[1.0; 64]);
        assert!(spectrum.iter().all(|z| z.norm() == 0.0));
    }

    #[test]
    fn test_set_basis_shape_checked() {
        let config = StftConfig::new(32, WindowType::Hann).unwrap();
        let mut stft = Transform::<f32>::new(config);
        assert!(matches!(
            stft.set_basis(Array2::zeros((10, 32))),
            Err(Error::DimensionMismatch { .. })
        ));
        stft.set_basis(Array2::zeros((34, 32))).unwrap();
        assert_eq!(stft.mode(), BasisMode::Trainable);
    }

    #[test]
    fn test_inverse_rejects_bad_shapes() {
        let config = StftConfig::default_256();
        let istft = InverseTransform::<f32>::new(config);
        let wrong_bins = Array2::<Complex<f32>>::zeros((100, 10));
        assert!(matches!(
            istft.process(wrong_bins.view()),
            Err(Error::DimensionMismatch { what: "frequency bins", .. })
        ));

        let spectrum = Array2::<Complex<f32>>::zeros((129, 10));
        assert!(istft.process_with_length(spectrum.view(), 64 * 11).is_ok());
        assert!(istft.process_with_length(spectrum.view(), 64 * 11 + 1).is_err());
    }

    #[test]
    fn test_partial_hop_length() {
        let config = StftConfig::default_256();
        let pair = TransformPair::<f64>::new(config, BasisMode::Fixed);
        let original = test_signal(64 * 10 + 17);

        let spectrum = pair.forward.process(&original);
        let reconstructed = pair
            .inverse
            .process_with_length(spectrum.view(), original.len())
            .unwrap();

        for (a, b) in original.iter().zip(reconstructed.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
