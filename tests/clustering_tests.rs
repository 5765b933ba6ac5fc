use approx::assert_abs_diff_eq;
use chimera_rs::clustering::{REGULARIZATION, regularized_inverse};
use chimera_rs::prelude::*;
use ndarray::{Array3, Array4, Axis, array};

/// Two sources, each loudest in half of the bins.
fn alternating_sources(batch: usize) -> Array4<Complex<f64>> {
    Array4::from_shape_fn((batch, 2, 4, 5), |(b, c, f, n)| {
        let loud = (f + n + b) % 2 == c;
        let magnitude = if loud { 1.0 + 0.1 * f as f64 } else { 0.2 };
        Complex::new(magnitude * (n as f64).cos(), magnitude * (n as f64).sin())
    })
}

#[test]
fn test_dominant_labels_are_one_hot() {
    let sources = alternating_sources(2);
    let labels = dominant_source_labels(sources.view());
    assert_eq!(labels.dim(), (2, 20, 2));

    for row in labels.lanes(Axis(2)) {
        assert_eq!(row.sum(), 1.0);
    }
    // Row f*N + n
    assert_eq!(labels[[0, 0, 0]], 1.0);
    assert_eq!(labels[[0, 1, 1]], 1.0);
    assert_eq!(labels[[0, 5, 1]], 1.0);
    assert_eq!(labels[[1, 0, 1]], 1.0);
}

#[test]
fn test_whitened_loss_vanishes_for_label_embeddings() {
    let labels = dominant_source_labels(alternating_sources(3).view());
    let loss = loss_dc_whitened(labels.view(), labels.view()).unwrap();
    assert_abs_diff_eq!(loss, 0.0, epsilon = 1e-9);
}

#[test]
fn test_whitened_loss_rejects_rank_deficient_embedding() {
    let labels = dominant_source_labels(alternating_sources(1).view());
    let mut embedding = Array3::from_elem((1, 20, 2), 1.0f64);
    embedding.index_axis_mut(Axis(2), 1).fill(0.5);

    // Both embedding dimensions are proportional, the regularizer is lost in rounding
    assert_eq!(
        loss_dc_whitened(embedding.view(), labels.view()),
        Err(Error::SingularMatrix { size: 2 })
    );
}

#[test]
fn test_dc_loss_matches_affinity_distance() {
    let embedding = array![[[1.0f64, 0.0], [0.6, 0.8], [0.0, 1.0]]];
    let labels = array![[[1.0f64, 0.0], [1.0, 0.0], [0.0, 1.0]]];

    // ||V V^T - Y Y^T||_F^2 computed directly
    let v = embedding.index_axis(Axis(0), 0);
    let y = labels.index_axis(Axis(0), 0);
    let diff = v.dot(&v.t()) - y.dot(&y.t());
    let expected: f64 = diff.iter().map(|x| x * x).sum();

    let loss = loss_dc(embedding.view(), labels.view()).unwrap();
    assert_abs_diff_eq!(loss, expected, epsilon = 1e-12);
    assert!(loss > 0.0);
}

#[test]
fn test_regularized_inverse() {
    // The zero eigenvalue is lifted to the regularizer
    let m = array![[4.0f64, 0.0], [0.0, 0.0]];
    let inverse = regularized_inverse(m.view()).unwrap();
    assert_abs_diff_eq!(inverse[[0, 0]], 0.25, epsilon = 1e-15);
    assert_abs_diff_eq!(inverse[[1, 1]], 1.0 / REGULARIZATION, epsilon = 1e10);
}

#[test]
fn test_label_count_mismatch() {
    let embedding = Array3::<f64>::zeros((1, 20, 3));
    let labels = Array3::<f64>::zeros((1, 19, 2));
    assert!(matches!(
        loss_dc(embedding.view(), labels.view()),
        Err(Error::DimensionMismatch { what: "label bins", .. })
    ));
}
