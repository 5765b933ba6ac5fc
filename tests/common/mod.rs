/// Common test utilities

pub fn calculate_snr(original: &[f64], reconstructed: &[f64]) -> f64 {
    assert_eq!(original.len(), reconstructed.len());

    let signal_power: f64 = original.iter().map(|x| x.powi(2)).sum();
    let noise_power: f64 = original
        .iter()
        .zip(reconstructed.iter())
        .map(|(o, r)| (o - r).powi(2))
        .sum();

    if noise_power == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (signal_power / noise_power).log10()
    }
}

#[allow(dead_code)]
pub fn calculate_snr_f32(original: &[f32], reconstructed: &[f32]) -> f64 {
    let original: Vec<f64> = original.iter().map(|&x| x as f64).collect();
    let reconstructed: Vec<f64> = reconstructed.iter().map(|&x| x as f64).collect();
    calculate_snr(&original, &reconstructed)
}

#[allow(dead_code)]
pub fn max_abs_error(original: &[f64], reconstructed: &[f64]) -> f64 {
    original
        .iter()
        .zip(reconstructed.iter())
        .map(|(o, r)| (o - r).abs())
        .fold(0.0, f64::max)
}

/// `amplitude * sin(omega * i)` with `omega` in radians per sample
#[allow(dead_code)]
pub fn tone(len: usize, omega: f64, amplitude: f64) -> Vec<f64> {
    (0..len)
        .map(|i| amplitude * (omega * i as f64).sin())
        .collect()
}

/// A few partials, loosely speech-like
#[allow(dead_code)]
pub fn test_signal(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let t = i as f64;
            0.3 * (0.031 * t).sin() + 0.2 * (0.173 * t).sin() + 0.1 * (0.911 * t).cos()
        })
        .collect()
}
