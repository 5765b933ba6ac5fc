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

//! Transform and reconstruction settings.
//!
//! [`StftConfig`] is the value type bundling `n_fft`, the hop and the analysis
//! window. It is validated once at construction and then passed by reference
//! to every transform, so the basis is never rebuilt per call.

use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hop is always this fraction of the FFT size (4:1 overlap).
pub const HOP_RATIO: usize = 4;

/// Minimum accumulated window energy for overlap-add normalization.
pub const ENERGY_THRESHOLD: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    #[default]
    Hann,
    Hamming,
    Blackman,
}

/// How a transform evaluates its projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasisMode {
    /// FFT-backed, basis implied by `n_fft` and the window
    #[default]
    Fixed,

    /// Explicit basis matrix owned by the transform and open to updates
    Trainable,
}

#[derive(Debug, Deserialize)]
struct RawStftConfig {
    n_fft: usize,
    hop: Option<usize>,
    #[serde(default)]
    window: WindowType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStftConfig")]
pub struct StftConfig {
    n_fft: usize,
    hop: usize,
    window: WindowType,
}

impl TryFrom<RawStftConfig> for StftConfig {
    type Error = Error;

    fn try_from(raw: RawStftConfig) -> Result<Self> {
        match raw.hop {
            Some(hop) => Self::with_hop(raw.n_fft, hop, raw.window),
            None => Self::new(raw.n_fft, raw.window),
        }
    }
}

impl StftConfig {
    pub fn new(n_fft: usize, window: WindowType) -> Result<Self> {
        if n_fft == 0 {
            return Err(Error::InvalidFftSize { n_fft });
        }
        if n_fft % HOP_RATIO != 0 {
            return Err(Error::InvalidHopRatio {
                n_fft,
                hop: n_fft / HOP_RATIO,
            });
        }
        if !n_fft.is_power_of_two() {
            log::warn!("n_fft={} is not a power of two, FFT will be slower", n_fft);
        }

        let config = Self {
            n_fft,
            hop: n_fft / HOP_RATIO,
            window,
        };
        config.validate_nola()?;

        Ok(config)
    }

    /// Build from an explicit hop, which must equal `n_fft / 4`.
    pub fn with_hop(n_fft: usize, hop: usize, window: WindowType) -> Result<Self> {
        if n_fft == 0 {
            return Err(Error::InvalidFftSize { n_fft });
        }
        if hop == 0 || hop * HOP_RATIO != n_fft {
            return Err(Error::InvalidHopRatio { n_fft, hop });
        }
        Self::new(n_fft, window)
    }

    /// 256-point FFT, 64 hop, Hann window
    pub fn default_256() -> Self {
        Self {
            n_fft: 256,
            hop: 64,
            window: WindowType::Hann,
        }
    }

    /// 512-point FFT, 128 hop, Hann window
    pub fn default_512() -> Self {
        Self {
            n_fft: 512,
            hop: 128,
            window: WindowType::Hann,
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop_size(&self) -> usize {
        self.hop
    }

    pub fn window(&self) -> WindowType {
        self.window
    }

    pub fn freq_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Zero padding applied to each side of a waveform before framing.
    pub fn padding(&self) -> usize {
        2 * self.hop
    }

    /// Number of frames produced for a waveform of `len` samples.
    pub fn num_frames(&self, len: usize) -> usize {
        let padded = len + 2 * self.padding();
        if padded < self.n_fft {
            return 0;
        }
        (padded - self.n_fft) / self.hop + 1
    }

    /// Default waveform length recovered from `num_frames` frames.
    pub fn output_len(&self, num_frames: usize) -> usize {
        num_frames.saturating_sub(1) * self.hop
    }

    /// Longest waveform `num_frames` frames can reconstruct.
    pub fn max_output_len(&self, num_frames: usize) -> usize {
        if num_frames == 0 {
            return 0;
        }
        ((num_frames - 1) * self.hop + self.n_fft).saturating_sub(self.padding())
    }

    pub fn overlap_percent(&self) -> f64 {
        (1.0 - self.hop as f64 / self.n_fft as f64) * 100.0
    }

    pub fn generate_window<T: Float>(&self) -> Vec<T> {
        generate_window(self.window, self.n_fft)
    }

    /// Validate NOLA condition: sum(w^2) over overlapping frames stays above threshold
    pub fn validate_nola(&self) -> Result<()> {
        let window = self.generate_window::<f64>();
        let num_overlaps = self.n_fft.div_ceil(self.hop);
        let test_len = self.n_fft + (num_overlaps - 1) * self.hop;
        let mut energy = vec![0.0; test_len];

        for i in 0..num_overlaps {
            let offset = i * self.hop;
            for (j, w) in window.iter().enumerate() {
                energy[offset + j] += w * w;
            }
        }

        // Only the steady-state region is fully overlapped
        let start = self.n_fft - self.hop;
        let end = test_len - (self.n_fft - self.hop);
        let min_energy = energy[start..end]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);

        if min_energy < ENERGY_THRESHOLD {
            return Err(Error::NolaViolation {
                min_energy,
                threshold: ENERGY_THRESHOLD,
            });
        }

        Ok(())
    }
}

impl Default for StftConfig {
    fn default() -> Self {
        Self::default_256()
    }
}

/// Periodic window of `size` samples (the DFT-even form used for analysis).
pub fn generate_window<T: Float>(window_type: WindowType, size: usize) -> Vec<T> {
    let two_pi = 2.0 * std::f64::consts::PI;
    let n = size as f64;

    (0..size)
        .map(|i| {
            let angle = two_pi * i as f64 / n;
            let w = match window_type {
                WindowType::Hann => 0.5 * (1.0 - angle.cos()),
                WindowType::Hamming => 0.54 - 0.46 * angle.cos(),
                WindowType::Blackman => 0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos(),
            };
            T::from(w).unwrap_or_else(T::zero)
        })
        .collect()
}

/// Everything a reconstruction network needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MisiConfig {
    pub stft: StftConfig,
    #[serde(default = "MisiConfig::default_iterations")]
    pub iterations: usize,
    #[serde(default)]
    pub mode: BasisMode,
}

impl MisiConfig {
    fn default_iterations() -> usize {
        1
    }

    pub fn new(stft: StftConfig, iterations: usize) -> Self {
        Self {
            stft,
            iterations,
            mode: BasisMode::Fixed,
        }
    }

    pub fn trainable(mut self) -> Self {
        self.mode = BasisMode::Trainable;
        self
    }
}

impl Default for MisiConfig {
    fn default() -> Self {
        Self::new(StftConfig::default(), Self::default_iterations())
    }
}
