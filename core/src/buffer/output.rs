use std::sync::RwLock;

/// Fixed-capacity destination for one derived channel.
///
/// Owned by the host and shared with the engine; the engine is the only
/// writer between calls.
#[derive(Debug)]
pub struct OutputBuffer {
    samples: RwLock<Vec<f32>>,
}

impl OutputBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: RwLock::new(vec![0.0; capacity]),
        }
    }

    pub fn capacity(&self) -> usize {
        match self.samples.read() {
            Ok(samples) => samples.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Copies `data` into the buffer and zeroes the remainder.
    ///
    /// Returns the number of samples written; anything past capacity is
    /// dropped from the end.
    pub fn write(&self, data: &[f32]) -> usize {
        let mut samples = match self.samples.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = data.len().min(samples.len());
        samples[..count].copy_from_slice(&data[..count]);
        samples[count..].fill(0.0);
        count
    }

    pub fn snapshot(&self) -> Vec<f32> {
        match self.samples.read() {
            Ok(samples) => samples.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
