use crate::buffer::signal::SignalBuffer;
use crate::montage::channel::DataGap;

/// Reads windows out of raw buffers.
pub struct WindowExtractor;

impl WindowExtractor {
    /// Samples `[start, end)` with zeros standing in for anything outside the
    /// buffer and for each recording gap.
    pub fn extract(buffer: &SignalBuffer, start: i64, end: i64, gaps: &[DataGap]) -> Vec<f64> {
        let mut signal = Self::window(buffer, start, end);
        Self::insert_gaps(&mut signal, gaps);
        signal
    }

    /// Samples `[start, end)`, zero-padded where the range leaves the buffer.
    pub fn window(buffer: &SignalBuffer, start: i64, end: i64) -> Vec<f64> {
        let length = buffer.len() as i64;
        let total = usize::try_from(end.saturating_sub(start)).unwrap_or(0);
        let pad_start = usize::try_from(start.saturating_neg()).unwrap_or(0).min(total);
        let pad_end = usize::try_from(end.saturating_sub(length))
            .unwrap_or(0)
            .min(total - pad_start);

        let read_start = start.clamp(0, length) as usize;
        let read_end = (end.clamp(0, length) as usize).max(read_start);

        let mut signal = Vec::with_capacity(total);
        signal.resize(pad_start, 0.0);
        buffer.read_into(read_start..read_end, &mut signal);
        signal.resize(signal.len() + pad_end, 0.0);
        signal
    }

    /// Splices zero stretches in at each gap, in ascending order.
    pub fn insert_gaps(signal: &mut Vec<f64>, gaps: &[DataGap]) {
        for gap in gaps {
            let at = gap.start().min(signal.len());
            signal.splice(at..at, std::iter::repeat(0.0).take(gap.len()));
        }
    }

    /// Removes the stretches added by [`insert_gaps`](Self::insert_gaps).
    ///
    /// Works back to front so earlier indices stay valid.
    pub fn remove_gaps(signal: &mut Vec<f64>, gaps: &[DataGap]) {
        for gap in gaps.iter().rev() {
            let end = gap.end().min(signal.len());
            let start = gap.start().min(end);
            signal.drain(start..end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> SignalBuffer {
        let data: Vec<f32> = (0..len).map(|i| i as f32 + 1.0).collect();
        SignalBuffer::from_samples(100.0, &data)
    }

    #[test]
    fn leading_overhang_yields_exact_zeros() {
        let buffer = ramp(10);
        let window = WindowExtractor::window(&buffer, -3, 4);
        assert_eq!(window, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(window[..3].iter().all(|v| v.to_bits() == 0.0f64.to_bits()));
    }

    #[test]
    fn trailing_overhang_is_padded() {
        let buffer = ramp(5);
        assert_eq!(
            WindowExtractor::window(&buffer, 3, 8),
            vec![4.0, 5.0, 0.0, 0.0, 0.0]
        );
        assert_eq!(
            WindowExtractor::window(&buffer, -2, 7),
            vec![0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 0.0, 0.0]
        );
    }

    #[test]
    fn window_entirely_outside_is_all_zero() {
        let buffer = ramp(5);
        assert_eq!(WindowExtractor::window(&buffer, 8, 11), vec![0.0; 3]);
        assert_eq!(WindowExtractor::window(&buffer, -6, -2), vec![0.0; 4]);
    }

    #[test]
    fn windows_at_the_ends_of_the_index_range_are_zero() {
        let buffer = ramp(5);
        assert_eq!(
            WindowExtractor::window(&buffer, i64::MIN, i64::MIN + 3),
            vec![0.0; 3]
        );
        assert_eq!(
            WindowExtractor::window(&buffer, i64::MAX - 2, i64::MAX),
            vec![0.0; 2]
        );
        assert!(WindowExtractor::window(&buffer, i64::MAX, i64::MIN).is_empty());
    }

    #[test]
    fn gaps_are_inserted_left_to_right() {
        let buffer = ramp(6);
        let signal = WindowExtractor::extract(&buffer, 0, 6, &[DataGap(1, 3), DataGap(4, 5)]);
        assert_eq!(
            signal,
            vec![1.0, 0.0, 0.0, 2.0, 0.0, 3.0, 4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn removing_gaps_restores_window() {
        let buffer = ramp(12);
        let gaps = [DataGap(0, 2), DataGap(5, 8), DataGap(10, 11)];
        let original = WindowExtractor::window(&buffer, -2, 10);
        let mut signal = WindowExtractor::extract(&buffer, -2, 10, &gaps);
        assert_eq!(signal.len(), original.len() + 6);
        WindowExtractor::remove_gaps(&mut signal, &gaps);
        assert_eq!(signal, original);
    }
}
