use crate::generator::template::sine_wave;
use crate::workflow::config::RecordingConfig;
use anyhow::{ensure, Context};
use montagecore::buffer::signal::SignalBuffer;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;

/// Samples of every recorded channel, channel-major.
#[derive(Debug, Clone)]
pub struct SyntheticRecording {
    pub sampling_rate: f64,
    pub channels: Vec<Vec<f32>>,
}

impl SyntheticRecording {
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fully written buffers, as if the recording had already finished.
    pub fn to_buffers(&self) -> Vec<Arc<SignalBuffer>> {
        self.channels
            .iter()
            .map(|samples| Arc::new(SignalBuffer::from_samples(self.sampling_rate, samples)))
            .collect()
    }

    /// Buffers sized for the whole recording with nothing published yet.
    pub fn empty_buffers(&self) -> Vec<Arc<SignalBuffer>> {
        self.channels
            .iter()
            .map(|samples| Arc::new(SignalBuffer::new(self.sampling_rate, samples.len())))
            .collect()
    }
}

pub fn build_recording(config: &RecordingConfig) -> anyhow::Result<SyntheticRecording> {
    ensure!(config.channels > 0, "recording needs at least one channel");
    ensure!(
        config.sampling_rate.is_finite() && config.sampling_rate > 0.0,
        "sampling rate {} is invalid",
        config.sampling_rate
    );
    let length = config.total_samples();
    ensure!(length > 0, "recording of {} s is empty", config.duration_secs);
    config
        .channels
        .checked_mul(length)
        .context("overflow computing sample count for recording")?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let line = config
        .line_frequency
        .map(|freq| sine_wave(length, freq, config.sampling_rate, config.line_amplitude));

    let mut channels = Vec::with_capacity(config.channels);
    for index in 0..config.channels {
        let mut samples = vec![0.0f32; length];
        for tone in config.tones.iter().filter(|tone| tone.channel == index) {
            let wave = sine_wave(length, tone.frequency, config.sampling_rate, tone.amplitude);
            for (sample, value) in samples.iter_mut().zip(wave) {
                *sample += value;
            }
        }
        if let Some(line) = &line {
            for (sample, value) in samples.iter_mut().zip(line) {
                *sample += value;
            }
        }
        if config.noise > 0.0 {
            for sample in samples.iter_mut() {
                *sample += rng.gen_range(-config.noise..config.noise);
            }
        }
        channels.push(samples);
    }

    Ok(SyntheticRecording {
        sampling_rate: config.sampling_rate,
        channels,
    })
}
