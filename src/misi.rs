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

//! Multiple Input Spectrogram Inversion.
//!
//! Each [`MisiStep`] keeps the per-bin magnitude of every channel estimate and
//! replaces its phase with the phase of a re-analysis in which the channel
//! waveforms have been shifted to sum to the mixture:
//!
//! ```text
//! s_c    = inverse(S_c)
//! delta  = m - (sum_c s_c) / C
//! S_c'   = |S_c|_target * unit(transform(s_c + delta))
//! ```
//!
//! [`MisiNetwork`] masks the mixture spectrum, then runs a fixed number of
//! steps and synthesizes the channel waveforms.

use ndarray::{Array2, Array3, Array4, ArrayView2, ArrayView3, ArrayView4, Axis, Zip};

use crate::config::{BasisMode, MisiConfig, StftConfig};
use crate::error::{Result, ensure_dim};
use crate::fft_backend::{Complex, Sample};
use crate::spectral::{Mask, magnitudes, unit_phasor};
use crate::transform::TransformPair;

/// One phase-correction iteration.
#[derive(Clone, Debug)]
pub struct MisiStep<T: Sample> {
    pair: TransformPair<T>,
}

impl<T: Sample> MisiStep<T> {
    pub fn new(pair: TransformPair<T>) -> Self {
        Self { pair }
    }

    pub fn pair(&self) -> &TransformPair<T> {
        &self.pair
    }

    /// Transforms of this step, for basis updates between evaluations.
    pub fn pair_mut(&mut self) -> &mut TransformPair<T> {
        &mut self.pair
    }

    /// Refine the phase of `estimate` against `mixture`.
    ///
    /// * `estimate` - `(batch, channels, F, N)` current complex estimate
    /// * `target_magnitude` - `(batch, channels, F, N)` magnitude to keep
    /// * `mixture` - `(batch, T)` mixture waveforms
    pub fn process(
        &self,
        estimate: ArrayView4<Complex<T>>,
        target_magnitude: ArrayView4<T>,
        mixture: ArrayView2<T>,
    ) -> Result<Array4<Complex<T>>> {
        let (batch, channels, freq_bins, num_frames) = estimate.dim();
        let config = self.pair.config();

        let (mag_batch, mag_channels, mag_bins, mag_frames) = target_magnitude.dim();
        ensure_dim("target magnitude batch", batch, mag_batch)?;
        ensure_dim("target magnitude channels", channels, mag_channels)?;
        ensure_dim("target magnitude bins", freq_bins, mag_bins)?;
        ensure_dim("target magnitude frames", num_frames, mag_frames)?;
        ensure_dim("mixture batch", batch, mixture.nrows())?;

        let length = mixture.ncols();
        ensure_dim("frames", config.num_frames(length), num_frames)?;
        self.pair.inverse.check(freq_bins, num_frames, length)?;

        let mut output = Array4::zeros(estimate.raw_dim());
        if channels == 0 {
            return Ok(output);
        }

        Zip::from(output.outer_iter_mut())
            .and(estimate.outer_iter())
            .and(target_magnitude.outer_iter())
            .and(mixture.outer_iter())
            .par_for_each(|mut out, est, mag, mix| {
                let waves: Vec<Vec<T>> = est
                    .outer_iter()
                    .map(|spectrum| self.pair.inverse.synthesize(spectrum, length))
                    .collect();

                // delta = m - (sum_c s_c) / C
                let mut delta = vec![T::zero(); length];
                for wave in &waves {
                    for (d, &s) in delta.iter_mut().zip(wave.iter()) {
                        *d = *d + s;
                    }
                }
                let channels_t = T::count(channels);
                for (d, &m) in delta.iter_mut().zip(mix.iter()) {
                    *d = m - *d / channels_t;
                }

                for ((mut out_c, mag_c), mut wave) in
                    out.outer_iter_mut().zip(mag.outer_iter()).zip(waves)
                {
                    for (s, &d) in wave.iter_mut().zip(delta.iter()) {
                        *s = *s + d;
                    }
                    let reanalysis = self.pair.forward.process(&wave);

                    Zip::from(&mut out_c)
                        .and(&mag_c)
                        .and(&reanalysis)
                        .for_each(|z, &m, &tmp| *z = unit_phasor(tmp) * m);
                }
            });

        Ok(output)
    }
}

/// Output of [`MisiNetwork::reconstruct_with_trace`].
#[derive(Clone, Debug)]
pub struct Reconstruction<T: Sample> {
    /// `(batch, channels, T)` channel waveforms
    pub waveforms: Array3<T>,

    /// L2 norm of `sum_c s_c - m` over the whole batch, before the first step
    /// and after every step (`iterations + 1` entries)
    pub residuals: Vec<T>,
}

/// Mask, refine, synthesize.
#[derive(Clone, Debug)]
pub struct MisiNetwork<T: Sample> {
    config: MisiConfig,
    pair: TransformPair<T>,
    steps: Vec<MisiStep<T>>,
}

impl<T: Sample> MisiNetwork<T> {
    pub fn new(config: MisiConfig) -> Self {
        log::debug!(
            "building MISI network: n_fft={}, iterations={}, mode={:?}",
            config.stft.n_fft(),
            config.iterations,
            config.mode
        );

        let pair = TransformPair::new(config.stft, config.mode);
        // Trainable steps each get their own basis to update
        let steps = (0..config.iterations)
            .map(|_| MisiStep::new(pair.clone()))
            .collect();

        Self {
            config,
            pair,
            steps,
        }
    }

    /// Network with an independently trainable basis per step.
    pub fn trainable(stft: StftConfig, iterations: usize) -> Self {
        Self::new(MisiConfig::new(stft, iterations).trainable())
    }

    pub fn config(&self) -> &MisiConfig {
        &self.config
    }

    pub fn iterations(&self) -> usize {
        self.steps.len()
    }

    pub fn mode(&self) -> BasisMode {
        self.config.mode
    }

    /// Transforms for the initial analysis and final synthesis.
    pub fn pair(&self) -> &TransformPair<T> {
        &self.pair
    }

    pub fn pair_mut(&mut self) -> &mut TransformPair<T> {
        &mut self.pair
    }

    pub fn steps(&self) -> &[MisiStep<T>] {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut [MisiStep<T>] {
        &mut self.steps
    }

    /// Reconstruct `(batch, channels, T)` waveforms from a `(batch, channels,
    /// F, N)` mask and `(batch, T)` mixtures.
    pub fn reconstruct(&self, mask: &Mask<T>, mixture: ArrayView2<T>) -> Result<Array3<T>> {
        let trace = log::log_enabled!(log::Level::Trace);
        self.run(mask, mixture, trace).map(|r| r.waveforms)
    }

    /// Like [`reconstruct`](Self::reconstruct), also reporting the
    /// mixture-consistency residual around every step.
    pub fn reconstruct_with_trace(
        &self,
        mask: &Mask<T>,
        mixture: ArrayView2<T>,
    ) -> Result<Reconstruction<T>> {
        self.run(mask, mixture, true)
    }

    /// Masked mixture spectrum `mask * transform(mixture)`, `(batch, channels, F, N)`.
    pub fn masked_spectrum(
        &self,
        mask: &Mask<T>,
        mixture: ArrayView2<T>,
    ) -> Result<Array4<Complex<T>>> {
        let stft = self.pair.config();
        let (batch, _channels, freq_bins, num_frames) = mask.dim();
        ensure_dim("mixture batch", batch, mixture.nrows())?;
        ensure_dim("mask bins", stft.freq_bins(), freq_bins)?;
        ensure_dim("mask frames", stft.num_frames(mixture.ncols()), num_frames)?;

        let mixture_spec = self.pair.forward.process_batch(mixture);
        let mask = mask.to_complex();

        // Replicate the mixture across channels
        Ok(&mask * &mixture_spec.view().insert_axis(Axis(1)))
    }

    fn run(&self, mask: &Mask<T>, mixture: ArrayView2<T>, trace: bool) -> Result<Reconstruction<T>> {
        let length = mixture.ncols();
        let mut estimate = self.masked_spectrum(mask, mixture)?;
        let target_magnitude = magnitudes(estimate.view());

        let mut residuals = Vec::new();
        if trace {
            residuals.push(self.residual(estimate.view(), mixture)?);
        }

        for (iteration, step) in self.steps.iter().enumerate() {
            estimate = step.process(estimate.view(), target_magnitude.view(), mixture)?;
            if trace {
                let residual = self.residual(estimate.view(), mixture)?;
                log::trace!("MISI iteration {}: residual={}", iteration + 1, residual);
                residuals.push(residual);
            }
        }

        let waveforms = self
            .pair
            .inverse
            .process_channels_with_length(estimate.view(), length)?;

        Ok(Reconstruction {
            waveforms,
            residuals,
        })
    }

    fn residual(&self, estimate: ArrayView4<Complex<T>>, mixture: ArrayView2<T>) -> Result<T> {
        let waves = self
            .pair
            .inverse
            .process_channels_with_length(estimate, mixture.ncols())?;
        Ok(mixture_residual(waves.view(), mixture))
    }
}

/// L2 norm of `sum_c s_c - m` over a `(batch, channels, T)` set of waveforms.
pub fn mixture_residual<T: Sample>(waveforms: ArrayView3<T>, mixture: ArrayView2<T>) -> T {
    let sum: Array2<T> = waveforms.sum_axis(Axis(1));
    Zip::from(&sum)
        .and(&mixture)
        .fold(T::zero(), |acc, &s, &m| acc + (s - m) * (s - m))
        .sqrt()
}

/// Run a fixed-basis network for `iterations` steps.
pub fn reconstruct<T: Sample>(
    config: &StftConfig,
    mask: &Mask<T>,
    mixture: ArrayView2<T>,
    iterations: usize,
) -> Result<Array3<T>> {
    MisiNetwork::new(MisiConfig::new(*config, iterations)).reconstruct(mask, mixture)
}
