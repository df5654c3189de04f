pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f64).sqrt()
    }

    /// Elementwise arithmetic mean of equally long windows.
    pub fn mean_across(windows: &[Vec<f64>]) -> Vec<f64> {
        let Some(first) = windows.first() else {
            return Vec::new();
        };
        let mut mean = first.clone();
        for window in &windows[1..] {
            for (acc, &value) in mean.iter_mut().zip(window) {
                *acc += value;
            }
        }
        let count = windows.len() as f64;
        for acc in mean.iter_mut() {
            *acc /= count;
        }
        mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_full_sine_period_is_amplitude_over_root_two() {
        let tone: Vec<f64> = (0..32)
            .map(|i| 2.0 * (std::f64::consts::TAU * i as f64 / 32.0).sin())
            .collect();
        assert!((StatsHelper::rms(&tone) - std::f64::consts::SQRT_2).abs() < 1e-9);

        let offset: Vec<f64> = tone.iter().map(|v| v + 1.5).collect();
        assert!((StatsHelper::rms(&offset) - (2.0f64 + 2.25).sqrt()).abs() < 1e-9);
        assert_eq!(StatsHelper::rms(&[]), 0.0);
    }

    #[test]
    fn mean_across_averages_elementwise() {
        let mean = StatsHelper::mean_across(&[vec![1.0, 2.0], vec![3.0, 6.0], vec![2.0, 1.0]]);
        assert_eq!(mean, vec![2.0, 3.0]);
        assert!(StatsHelper::mean_across(&[]).is_empty());
    }
}
