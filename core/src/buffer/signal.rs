use std::ops::Range;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// Watermark value meaning "nothing has been written yet".
pub const UNWRITTEN: i64 = -1;

/// Producer-advanced range of validly written sample indices.
///
/// Both fields only ever move forward. The producer stores samples first
/// and then publishes with `Release`; readers load with `Acquire`, so any
/// sample inside a published range is visible to them.
#[derive(Debug)]
pub struct Watermark {
    start: AtomicI64,
    end: AtomicI64,
}

/// Point-in-time view of a [`Watermark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkSnapshot {
    pub updated_start: i64,
    pub updated_end: i64,
}

impl WatermarkSnapshot {
    pub fn is_unwritten(&self) -> bool {
        self.updated_start == UNWRITTEN
    }
}

impl Watermark {
    pub fn unwritten() -> Self {
        Self {
            start: AtomicI64::new(UNWRITTEN),
            end: AtomicI64::new(UNWRITTEN),
        }
    }

    fn written(start: i64, end: i64) -> Self {
        Self {
            start: AtomicI64::new(start),
            end: AtomicI64::new(end),
        }
    }

    pub fn snapshot(&self) -> WatermarkSnapshot {
        // end first: a later start can only narrow the range we trust.
        let updated_end = self.end.load(Ordering::Acquire);
        let updated_start = self.start.load(Ordering::Acquire);
        WatermarkSnapshot {
            updated_start,
            updated_end,
        }
    }

    fn publish(&self, range: Range<usize>) {
        let _ = self.start.compare_exchange(
            UNWRITTEN,
            range.start as i64,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.end.fetch_max(range.end as i64, Ordering::Release);
    }

    fn advance_start(&self, index: i64) {
        self.start.fetch_max(index, Ordering::Release);
    }
}

/// Error returned by producer-side writes.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferWriteError {
    #[error("write of {len} samples at {offset} overflows buffer of {capacity}")]
    Overflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },
}

/// Append-only sample storage for one physical input channel.
///
/// The header (sampling rate and watermark) sits beside a fixed-length data
/// region. Samples are stored as `f32` bit patterns in atomics so the host's
/// producer may fill the buffer while the engine reads it.
#[derive(Debug)]
pub struct SignalBuffer {
    sampling_rate: f64,
    watermark: Watermark,
    samples: Box<[AtomicU32]>,
}

impl SignalBuffer {
    /// Allocates an empty buffer of `capacity` samples with nothing written.
    pub fn new(sampling_rate: f64, capacity: usize) -> Self {
        let samples = (0..capacity)
            .map(|_| AtomicU32::new(0f32.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            sampling_rate,
            watermark: Watermark::unwritten(),
            samples,
        }
    }

    /// Builds a fully written buffer from existing samples.
    pub fn from_samples(sampling_rate: f64, data: &[f32]) -> Self {
        let samples = data
            .iter()
            .map(|value| AtomicU32::new(value.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            sampling_rate,
            watermark: Watermark::written(0, data.len() as i64),
            samples,
        }
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Full logical length of the buffer.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    /// Producer side: store `data` at `offset`, then publish the range.
    pub fn write(&self, offset: usize, data: &[f32]) -> Result<(), BufferWriteError> {
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= self.samples.len())
            .ok_or(BufferWriteError::Overflow {
                offset,
                len: data.len(),
                capacity: self.samples.len(),
            })?;

        for (slot, value) in self.samples[offset..end].iter().zip(data) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
        self.watermark.publish(offset..end);
        Ok(())
    }

    /// Producer side: mark samples before `index` as no longer valid.
    pub fn advance_start(&self, index: usize) {
        self.watermark.advance_start(index as i64);
    }

    /// Copies `range` (clamped to the buffer) into `out` as `f64`.
    pub fn read_into(&self, range: Range<usize>, out: &mut Vec<f64>) {
        let end = range.end.min(self.samples.len());
        let start = range.start.min(end);
        out.extend(
            self.samples[start..end]
                .iter()
                .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)) as f64),
        );
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)))
            .collect()
    }
}
