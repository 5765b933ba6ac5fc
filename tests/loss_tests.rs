use approx::assert_relative_eq;
use chimera_rs::loss::PROBABILITY_FLOOR;
use chimera_rs::prelude::*;
use ndarray::{Array3, Array4, Array5, Axis, s};

const BINS: usize = 5;
const FRAMES: usize = 6;

fn sources(batch: usize, channels: usize) -> Array4<Complex<f64>> {
    Array4::from_shape_fn((batch, channels, BINS, FRAMES), |(b, c, f, n)| {
        let x = (13 * b + 7 * c + 3 * f + n) as f64;
        Complex::new((0.37 * x).sin() * (c + 1) as f64, (0.61 * x).cos())
    })
}

fn mixture_of(sources: &Array4<Complex<f64>>) -> Array3<Complex<f64>> {
    sources.sum_axis(Axis(1))
}

fn mask(batch: usize, channels: usize) -> Array4<f64> {
    Array4::from_shape_fn((batch, channels, BINS, FRAMES), |(b, c, f, n)| {
        0.1 + 0.8 * ((b + 2 * c + f * n) as f64 * 0.29).sin().abs()
    })
}

/// Swap channels 0 and 1 along axis 1.
fn swapped<A: Clone, D: ndarray::RemoveAxis>(array: &ndarray::Array<A, D>) -> ndarray::Array<A, D> {
    let mut out = array.clone();
    for (mut dst, src) in out
        .axis_iter_mut(Axis(1))
        .zip([1usize, 0].iter().map(|&c| array.index_axis(Axis(1), c)))
    {
        dst.assign(&src);
    }
    out
}

#[test]
fn test_losses_symmetric_under_channel_swap() {
    let sources = sources(2, 2);
    let mixture = mixture_of(&sources);
    let mask = mask(2, 2);
    let sources_sw = swapped(&sources);
    let mask_sw = swapped(&mask);

    let msa = loss_mi_msa(mask.view(), mixture.view(), sources.view()).unwrap();
    let msa_sw = loss_mi_msa(mask_sw.view(), mixture.view(), sources_sw.view()).unwrap();
    assert_relative_eq!(msa, msa_sw, max_relative = 1e-12);

    for norm in [Norm::L1, Norm::L2] {
        let tpsa =
            loss_mi_tpsa(mask.view(), mixture.view(), sources.view(), 1.0, norm).unwrap();
        let tpsa_sw =
            loss_mi_tpsa(mask_sw.view(), mixture.view(), sources_sw.view(), 1.0, norm).unwrap();
        assert_relative_eq!(tpsa, tpsa_sw, max_relative = 1e-12);

        let com = mask.mapv(|m| Complex::new(m, 0.5 * m));
        let com_sw = swapped(&com);
        let csa = loss_csa(com.view(), mixture.view(), sources.view(), norm).unwrap();
        let csa_sw = loss_csa(com_sw.view(), mixture.view(), sources_sw.view(), norm).unwrap();
        assert_relative_eq!(csa, csa_sw, max_relative = 1e-12);
    }

    let waves = Array3::from_shape_fn((2, 2, 50), |(b, c, i)| ((b + c * i) as f64 * 0.1).sin());
    let truth = waves.mapv(|x| 0.9 * x + 0.01);
    let wa = loss_wa(waves.view(), truth.view()).unwrap();
    let wa_sw = loss_wa(swapped(&waves).view(), swapped(&truth).view()).unwrap();
    assert_relative_eq!(wa, wa_sw, max_relative = 1e-12);
}

#[test]
fn test_matching_ignores_estimate_order() {
    let sources = sources(1, 2);
    let mixture = mixture_of(&sources);
    let mask = mask(1, 2);

    // Only the estimates are swapped; the loss must not change
    let a = loss_mi_msa(mask.view(), mixture.view(), sources.view()).unwrap();
    let b = loss_mi_msa(swapped(&mask).view(), mixture.view(), sources.view()).unwrap();
    assert_relative_eq!(a, b, max_relative = 1e-12);
}

#[test]
fn test_loss_is_sum_over_batch() {
    let sources = sources(3, 2);
    let mixture = mixture_of(&sources);
    let mask = mask(3, 2);

    let total = loss_mi_msa(mask.view(), mixture.view(), sources.view()).unwrap();
    let per_example: f64 = (0..3)
        .map(|b| {
            loss_mi_msa(
                mask.slice(s![b..b + 1, .., .., ..]),
                mixture.slice(s![b..b + 1, .., ..]),
                sources.slice(s![b..b + 1, .., .., ..]),
            )
            .unwrap()
        })
        .sum();
    assert_relative_eq!(total, per_example, max_relative = 1e-12);
}

#[test]
fn test_csa_identity_mask() {
    let sources = sources(1, 1);
    let mixture = mixture_of(&sources).mapv(|x| x + Complex::new(0.25, -0.5));
    let identity = Array4::from_elem(sources.raw_dim(), Complex::new(1.0, 0.0));

    let loss = loss_csa(identity.view(), mixture.view(), sources.view(), Norm::L1).unwrap();
    let expected: f64 = mixture
        .iter()
        .zip(sources.iter())
        .map(|(x, s)| (x - s).norm_sqr().max(1e-12).sqrt())
        .sum();
    assert_relative_eq!(loss, expected, max_relative = 1e-12);

    let loss = loss_csa(identity.view(), mixture.view(), sources.view(), Norm::L2).unwrap();
    let expected: f64 = mixture
        .iter()
        .zip(sources.iter())
        .map(|(x, s)| (x - s).norm_sqr().max(1e-12))
        .sum();
    assert_relative_eq!(loss, expected, max_relative = 1e-12);
}

#[test]
fn test_msa_zero_for_ideal_mask() {
    let sources = sources(1, 2);
    let mixture = mixture_of(&sources);
    let mut ideal = Array4::zeros(sources.raw_dim());
    ndarray::Zip::indexed(&mut ideal).for_each(|(b, c, f, n), m| {
        *m = sources[[b, c, f, n]].norm() / mixture[[b, f, n]].norm();
    });
    let loss = loss_mi_msa(ideal.view(), mixture.view(), sources.view()).unwrap();
    assert!(loss < 1e-20);
}

#[test]
fn test_ce_phase_floor_keeps_loss_finite() {
    let pi = std::f64::consts::PI;
    let phasebook = [-pi / 2.0, 0.0, pi / 2.0, pi];
    let target = Array4::from_elem((1, 2, BINS, FRAMES), 1e-40f64);
    let prob = Array5::<f64>::zeros((1, 2, BINS, FRAMES, 4));

    let loss = loss_ce_phase(prob.view(), PhaseTarget::Radians(target.view()), &phasebook)
        .unwrap();
    assert!(loss.is_finite());
    let expected = -(PROBABILITY_FLOOR.ln()) * (2 * BINS * FRAMES) as f64;
    assert_relative_eq!(loss, expected, max_relative = 1e-12);
}

#[test]
fn test_ce_phase_complex_target() {
    let pi = std::f64::consts::PI;
    let phasebook = [0.0f64, pi / 2.0, pi, -pi / 2.0];
    // Channel 0 points along +i, channel 1 along -1
    let mut target = Array4::from_elem((1, 2, 1, 1), Complex::new(0.0f64, 3.0));
    target[[0, 1, 0, 0]] = Complex::new(-2.0, 0.0);

    let mut prob = Array5::from_elem((1, 2, 1, 1, 4), 0.1f64);
    prob[[0, 0, 0, 0, 2]] = 0.7;
    prob[[0, 1, 0, 0, 1]] = 0.7;

    // Estimate 1 predicts +i and estimate 0 predicts -1: swapped
    let loss = loss_ce_phase(prob.view(), PhaseTarget::Complex(target.view()), &phasebook)
        .unwrap();
    assert_relative_eq!(loss, -2.0 * 0.7f64.ln(), max_relative = 1e-12);
}

#[test]
fn test_unsupported_norm() {
    assert_eq!(Norm::try_from(3u32), Err(Error::UnsupportedNorm { order: 3 }));
    assert_eq!(Norm::try_from(0u32), Err(Error::UnsupportedNorm { order: 0 }));
}

#[test]
fn test_dimension_mismatch() {
    let sources = sources(2, 2);
    let mixture = mixture_of(&sources);

    let wrong_channels = mask(2, 3);
    assert!(matches!(
        loss_mi_msa(wrong_channels.view(), mixture.view(), sources.view()),
        Err(Error::DimensionMismatch { .. })
    ));

    let wrong_batch = mixture.slice(s![0..1, .., ..]);
    assert!(matches!(
        loss_mi_tpsa(mask(2, 2).view(), wrong_batch, sources.view(), 1.0, Norm::L1),
        Err(Error::DimensionMismatch { what: "mixture batch", .. })
    ));

    let truth = Array3::<f64>::zeros((2, 2, 10));
    let predicted = Array3::<f64>::zeros((2, 2, 11));
    assert!(loss_wa(predicted.view(), truth.view()).is_err());
}
