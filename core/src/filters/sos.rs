//! Cascaded biquad filtering over whole signals.

use ndarray::{Array2, ArrayView1};

/// Per-section delay line of a transposed direct form II biquad.
pub type SectionState = [f64; 2];

fn run_section(row: ArrayView1<f64>, state: &mut SectionState, signal: &mut [f64]) {
    let (b0, b1, b2) = (row[0], row[1], row[2]);
    let (a1, a2) = (row[4] / row[3], row[5] / row[3]);
    let (b0, b1, b2) = (b0 / row[3], b1 / row[3], b2 / row[3]);
    let [mut z1, mut z2] = *state;
    for sample in signal.iter_mut() {
        let x = *sample;
        let y = b0 * x + z1;
        z1 = b1 * x - a1 * y + z2;
        z2 = b2 * x - a2 * y;
        *sample = y;
    }
    *state = [z1, z2];
}

/// Filters `signal` in place through every section of `sos`.
pub fn sosfilt(sos: &Array2<f64>, signal: &mut [f64], state: &mut [SectionState]) {
    for (row, section_state) in sos.rows().into_iter().zip(state.iter_mut()) {
        run_section(row, section_state, signal);
    }
}

/// Initial section states for a unit step, so a constant input produces a
/// constant output from the first sample on.
pub fn sosfilt_zi(sos: &Array2<f64>) -> Vec<SectionState> {
    let mut scale = 1.0;
    sos.rows()
        .into_iter()
        .map(|row| {
            let a0 = row[3];
            let (b0, b1, b2) = (row[0] / a0, row[1] / a0, row[2] / a0);
            let (a1, a2) = (row[4] / a0, row[5] / a0);
            let pole_sum = 1.0 + a1 + a2;

            let rhs0 = b1 - a1 * b0;
            let rhs1 = b2 - a2 * b0;
            let z1 = (rhs0 + rhs1) / pole_sum;
            let z2 = rhs1 - a2 * z1;
            let zi = [scale * z1, scale * z2];

            scale *= (b0 + b1 + b2) / pole_sum;
            zi
        })
        .collect()
}

/// Number of samples reflected onto each edge before a zero-phase pass.
pub fn default_padlen(sos: &Array2<f64>) -> usize {
    let sections = sos.nrows();
    let trailing_b = sos.column(2).iter().filter(|&&v| v == 0.0).count();
    let trailing_a = sos.column(5).iter().filter(|&&v| v == 0.0).count();
    3 * (2 * sections + 1 - trailing_b.min(trailing_a))
}

/// Reflects the signal about its end points by `padlen` samples.
fn odd_extend(signal: &[f64], padlen: usize) -> Vec<f64> {
    let n = signal.len();
    let first = signal[0];
    let last = signal[n - 1];
    let mut out = Vec::with_capacity(n + 2 * padlen);
    out.extend((1..=padlen).rev().map(|i| 2.0 * first - signal[i]));
    out.extend_from_slice(signal);
    out.extend((1..=padlen).map(|i| 2.0 * last - signal[n - 1 - i]));
    out
}

/// Forward-backward filtering: zero phase, squared magnitude response.
///
/// The edges are odd-extended by [`default_padlen`] samples, clamped so the
/// reflection stays inside short signals.
pub fn sosfiltfilt(sos: &Array2<f64>, signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() || sos.nrows() == 0 {
        return signal.to_vec();
    }
    let padlen = default_padlen(sos).min(signal.len() - 1);
    let mut work = odd_extend(signal, padlen);
    let zi = sosfilt_zi(sos);

    let scaled = |x0: f64| -> Vec<SectionState> {
        zi.iter().map(|[z1, z2]| [z1 * x0, z2 * x0]).collect()
    };

    let mut state = scaled(work[0]);
    sosfilt(sos, &mut work, &mut state);

    work.reverse();
    let mut state = scaled(work[0]);
    sosfilt(sos, &mut work, &mut state);
    work.reverse();

    work.drain(..padlen);
    work.truncate(signal.len());
    work
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::design::{butter_sos, Band};
    use std::f64::consts::PI;

    fn sine(freq: f64, fs: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    fn best_lag(a: &[f64], b: &[f64], max_lag: isize) -> isize {
        let n = a.len() as isize;
        (-max_lag..=max_lag)
            .map(|lag| {
                let score: f64 = (0..n)
                    .filter(|&i| (0..n).contains(&(i + lag)))
                    .map(|i| a[i as usize] * b[(i + lag) as usize])
                    .sum();
                (lag, score)
            })
            .fold((0, f64::MIN), |best, cur| if cur.1 > best.1 { cur } else { best })
            .0
    }

    #[test]
    fn zi_holds_constant_input_steady() {
        let sos = butter_sos(4, Band::Lowpass(10.0), 100.0).unwrap();
        let mut signal = vec![2.5; 50];
        let mut state: Vec<SectionState> = sosfilt_zi(&sos)
            .into_iter()
            .map(|[z1, z2]| [z1 * 2.5, z2 * 2.5])
            .collect();
        sosfilt(&sos, &mut signal, &mut state);
        for value in signal {
            assert!((value - 2.5).abs() < 1e-9);
        }
    }

    #[test]
    fn padlen_counts_first_order_sections() {
        let even = butter_sos(4, Band::Lowpass(10.0), 100.0).unwrap();
        let odd = butter_sos(3, Band::Lowpass(10.0), 100.0).unwrap();
        assert_eq!(default_padlen(&even), 15);
        assert_eq!(default_padlen(&odd), 12);
    }

    #[test]
    fn odd_extension_mirrors_about_edges() {
        let ext = odd_extend(&[1.0, 2.0, 4.0], 2);
        assert_eq!(ext, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 6.0, 7.0]);
    }

    #[test]
    fn passband_sine_keeps_phase() {
        let fs = 256.0;
        let input = sine(10.0, fs, 1024);
        let sos = butter_sos(6, Band::Highpass(1.0), fs).unwrap();
        let output = sosfiltfilt(&sos, &input);
        assert_eq!(output.len(), input.len());
        assert_eq!(best_lag(&input, &output, 12), 0);

        let sos = butter_sos(6, Band::Lowpass(40.0), fs).unwrap();
        let output = sosfiltfilt(&sos, &input);
        assert_eq!(best_lag(&input, &output, 12), 0);
        let mid = &output[256..768];
        let peak = mid.iter().cloned().fold(0.0_f64, f64::max);
        assert!((peak - 1.0).abs() < 0.01);
    }

    #[test]
    fn short_signal_clamps_padding() {
        let sos = butter_sos(6, Band::Lowpass(20.0), 256.0).unwrap();
        let output = sosfiltfilt(&sos, &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(output.len(), 4);
        for value in output {
            assert!((value - 1.0).abs() < 1e-6);
        }
        let single = sosfiltfilt(&sos, &[0.7]);
        assert_eq!(single.len(), 1);
        assert!((single[0] - 0.7).abs() < 1e-9);
    }
}
