use std::fmt;

use crate::buffer::gate::NotReadyReason;

/// Working signal for one derived channel as it moves through the stages.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFrame {
    pub samples: Vec<f64>,
    pub sampling_rate: f64,
}

impl ChannelFrame {
    pub fn new(samples: Vec<f64>, sampling_rate: f64) -> Self {
        Self {
            samples,
            sampling_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Error raised while deriving a single channel.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("filter design failed: {0}")]
    FilterDesign(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// A channel that could not be derived during a `compute_signals` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFailure {
    /// Montage channel index.
    pub channel: usize,
    pub error: StageError,
}

impl fmt::Display for ChannelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel {}: {}", self.channel, self.error)
    }
}

/// Common error type for engine operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DerivationError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("montage `{0}` has not been added")]
    MontageNotFound(String),
    #[error("input buffer {buffer} is not ready: {reason}")]
    NotReady {
        buffer: usize,
        reason: NotReadyReason,
    },
    #[error("selection has {expected} channel(s) but {actual} output buffer(s) are set")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("{} channel(s) failed to derive", .0.len())]
    ChannelFailures(Vec<ChannelFailure>),
}

impl DerivationError {
    /// Human-readable messages, one per cause.
    pub fn messages(&self) -> Vec<String> {
        match self {
            DerivationError::ChannelFailures(failures) => {
                failures.iter().map(ToString::to_string).collect()
            }
            other => vec![other.to_string()],
        }
    }
}

pub type DerivationResult<T> = Result<T, DerivationError>;

/// A single step of the per-channel derivation sequence.
pub trait ProcessingStage {
    fn name(&self) -> &'static str;
    fn execute(&mut self, frame: ChannelFrame) -> StageResult<ChannelFrame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_failures_expand_into_messages() {
        let err = DerivationError::ChannelFailures(vec![
            ChannelFailure {
                channel: 1,
                error: StageError::FilterDesign("cutoff above nyquist".into()),
            },
            ChannelFailure {
                channel: 4,
                error: StageError::InvalidInput("trim out of range".into()),
            },
        ]);
        let messages = err.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("channel 1: filter design failed"));
        assert_eq!(err.to_string(), "2 channel(s) failed to derive");
    }

    #[test]
    fn single_errors_yield_one_message() {
        let err = DerivationError::SizeMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.messages().len(), 1);
    }
}
