use std::fmt;

use crate::buffer::signal::SignalBuffer;

/// Why a requested range cannot be read yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    Unwritten,
    StartAhead { updated_start: i64, start: i64 },
    EndBehind { updated_end: i64, end: i64 },
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReadyReason::Unwritten => write!(f, "nothing has been written yet"),
            NotReadyReason::StartAhead {
                updated_start,
                start,
            } => write!(
                f,
                "valid data starts at {} but {} was requested",
                updated_start, start
            ),
            NotReadyReason::EndBehind { updated_end, end } => write!(
                f,
                "data written up to {} but {} was requested",
                updated_end, end
            ),
        }
    }
}

/// Decides whether a producer has finished writing a requested range.
pub struct FreshnessGate;

impl FreshnessGate {
    /// Checks `[start, end)` against the buffer's current watermark.
    ///
    /// Only the in-buffer part of the range is checked: samples before index 0
    /// or past a fully written buffer's length are zero-padded by the
    /// extractor.
    pub fn check(buffer: &SignalBuffer, start: i64, end: i64) -> Result<(), NotReadyReason> {
        let snapshot = buffer.watermark().snapshot();
        if snapshot.is_unwritten() {
            return Err(NotReadyReason::Unwritten);
        }
        let start = start.max(0);
        if snapshot.updated_start > start {
            return Err(NotReadyReason::StartAhead {
                updated_start: snapshot.updated_start,
                start,
            });
        }
        if snapshot.updated_end < buffer.len() as i64 && snapshot.updated_end < end {
            return Err(NotReadyReason::EndBehind {
                updated_end: snapshot.updated_end,
                end,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_buffer_is_never_ready() {
        let buffer = SignalBuffer::new(256.0, 100);
        assert_eq!(
            FreshnessGate::check(&buffer, 0, 1),
            Err(NotReadyReason::Unwritten)
        );
    }

    #[test]
    fn request_past_written_end_is_not_ready() {
        let buffer = SignalBuffer::new(256.0, 100);
        buffer.write(0, &[0.5; 40]).unwrap();
        for (start, end) in [(0, 41), (-10, 50), (39, 100), (20, 1000)] {
            assert_eq!(
                FreshnessGate::check(&buffer, start, end),
                Err(NotReadyReason::EndBehind {
                    updated_end: 40,
                    end
                })
            );
        }
        assert!(FreshnessGate::check(&buffer, 0, 40).is_ok());
        assert!(FreshnessGate::check(&buffer, -5, 10).is_ok());
    }

    #[test]
    fn request_before_valid_start_is_not_ready() {
        let buffer = SignalBuffer::from_samples(256.0, &[0.0; 50]);
        buffer.advance_start(10);
        assert!(matches!(
            FreshnessGate::check(&buffer, 5, 20),
            Err(NotReadyReason::StartAhead { .. })
        ));
        assert!(FreshnessGate::check(&buffer, 10, 20).is_ok());
    }

    #[test]
    fn padding_before_sample_zero_is_not_waited_on() {
        let buffer = SignalBuffer::from_samples(256.0, &[0.0; 2048]);
        assert!(FreshnessGate::check(&buffer, -256, 512).is_ok());
        assert!(FreshnessGate::check(&buffer, i64::MIN, 0).is_ok());

        buffer.advance_start(10);
        assert_eq!(
            FreshnessGate::check(&buffer, -256, 512),
            Err(NotReadyReason::StartAhead {
                updated_start: 10,
                start: 0
            })
        );
    }

    #[test]
    fn fully_written_buffer_accepts_overhanging_end() {
        let buffer = SignalBuffer::from_samples(256.0, &[0.0; 50]);
        assert!(FreshnessGate::check(&buffer, 40, 80).is_ok());
    }
}
