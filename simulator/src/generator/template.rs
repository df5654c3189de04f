use std::f64::consts::PI;

/// `length` samples of `amplitude * sin(2π f t)` at `sampling_rate`.
pub fn sine_wave(length: usize, frequency: f64, sampling_rate: f64, amplitude: f32) -> Vec<f32> {
    (0..length)
        .map(|i| (2.0 * PI * frequency * i as f64 / sampling_rate).sin() as f32 * amplitude)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_period_reaches_amplitude() {
        let wave = sine_wave(5, 1.0, 4.0, 2.0);
        assert_eq!(wave.len(), 5);
        assert!(wave[0].abs() < 1e-6);
        assert!((wave[1] - 2.0).abs() < 1e-6);
        assert!(wave[2].abs() < 1e-5);
    }
}
