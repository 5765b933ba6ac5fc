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

//! Phase reconstruction and permutation-invariant losses for source separation.
//!
//! * [`transform`]: windowed transform pair with a fixed (FFT) or trainable
//!   (explicit matrix) basis, `hop = n_fft/4`, Hann window by default
//! * [`misi`]: Multiple Input Spectrogram Inversion
//! * [`permutation`]: exhaustive permutation-invariant matching
//! * [`loss`], [`clustering`]: separation and deep-clustering losses
//!
//! ```no_run
//! use chimera_rs::prelude::*;
//! use ndarray::{Array2, Array4};
//!
//! let config = StftConfig::default_256();
//! let mixture = Array2::<f32>::zeros((1, 64 * 100));
//! let mask = Mask::Real(Array4::from_elem((1, 2, 129, 101), 0.5));
//! let sources = reconstruct(&config, &mask, mixture.view(), 5).unwrap();
//! assert_eq!(sources.dim(), (1, 2, 64 * 100));
//! ```

pub mod basis;
pub mod clustering;
pub mod config;
pub mod error;
pub mod fft_backend;
pub mod loss;
pub mod misi;
pub mod permutation;
pub mod simd;
pub mod spectral;
pub mod transform;

pub use config::{BasisMode, MisiConfig, StftConfig, WindowType};
pub use error::{Error, Result};
pub use fft_backend::{Complex, Sample};
pub use misi::{MisiNetwork, MisiStep, Reconstruction, reconstruct};
pub use permutation::{Matching, Permutations, best_cost, best_permutation_cost};
pub use spectral::Mask;
pub use transform::{InverseTransform, Transform, TransformPair, inverse, transform};

pub mod prelude {
    pub use crate::clustering::{dominant_source_labels, loss_dc, loss_dc_whitened};
    pub use crate::loss::{
        Norm, PhaseTarget, loss_ce_phase, loss_csa, loss_mi_msa, loss_mi_tpsa, loss_wa,
    };
    pub use crate::permutation::best_cost_batch;
    pub use crate::{
        BasisMode, Complex, Error, InverseTransform, Mask, Matching, MisiConfig, MisiNetwork,
        MisiStep, Permutations, Reconstruction, Sample, StftConfig, Transform,
        TransformPair, WindowType, best_cost, best_permutation_cost, inverse, reconstruct,
        transform,
    };
}
