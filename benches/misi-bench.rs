use criterion::{Criterion, criterion_group, criterion_main};
use ndarray::{Array2, Array4};
use std::{hint::black_box, time::Duration};

use chimera_rs::prelude::*;

fn mixture(batch: usize, len: usize) -> Array2<f32> {
    let sample_rate = 8000.0;
    Array2::from_shape_fn((batch, len), |(b, i)| {
        let t = i as f32 / sample_rate;
        0.3 * (2.0 * std::f32::consts::PI * (220.0 + 20.0 * b as f32) * t).sin()
            + 0.2 * (2.0 * std::f32::consts::PI * 1250.0 * t).sin()
    })
}

pub fn transform_bench(c: &mut Criterion) {
    let config = StftConfig::default_256();
    let signals = mixture(8, 8000 * 4);

    let fixed = TransformPair::<f32>::new(config, BasisMode::Fixed);
    let trainable = TransformPair::<f32>::new(config, BasisMode::Trainable);

    let mut group = c.benchmark_group("transform");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("fixed_forward", |b| {
        b.iter(|| fixed.forward.process_batch(black_box(signals.view())))
    });
    group.bench_function("trainable_forward", |b| {
        b.iter(|| trainable.forward.process_batch(black_box(signals.view())))
    });

    let spectra = fixed.forward.process_batch(signals.view());
    group.bench_function("fixed_inverse", |b| {
        b.iter(|| fixed.inverse.process_batch(black_box(spectra.view())))
    });
    group.finish();
}

pub fn misi_bench(c: &mut Criterion) {
    let config = StftConfig::default_256();
    let len = 8000 * 4;
    let signals = mixture(4, len);
    let frames = config.num_frames(len);
    let mask = Mask::Real(Array4::from_elem((4, 2, config.freq_bins(), frames), 0.5f32));
    let network = MisiNetwork::<f32>::new(MisiConfig::new(config, 5));

    c.bench_function("misi_5_iterations", |b| {
        b.iter(|| network.reconstruct(black_box(&mask), black_box(signals.view())))
    });
}

pub fn permutation_bench(c: &mut Criterion) {
    let matrices: Vec<Array2<f64>> = (0..32)
        .map(|k| Array2::from_shape_fn((4, 4), |(i, j)| ((i * 7 + j * 3 + k) % 11) as f64))
        .collect();

    c.bench_function("best_cost_batch_c4", |b| {
        b.iter(|| best_cost_batch(black_box(&matrices)))
    });
}

criterion_group!(benches, transform_bench, misi_bench, permutation_bench);
criterion_main!(benches);
