use std::sync::Arc;

use crate::buffer::signal::SignalBuffer;
use crate::filters::cache::CoefficientCache;
use crate::filters::defaults::DefaultFilters;
use crate::math::stats::StatsHelper;
use crate::montage::channel::ChannelDefinition;
use crate::prelude::{ChannelFrame, ProcessingStage, StageError, StageResult};
use crate::processing::extract::WindowExtractor;
use crate::processing::reference::ReferenceComputer;
use crate::processing::stages::{DegapStage, FilterStage, FitStage, TrimStage};
use crate::telemetry::log::LogManager;

/// Result of deriving one channel, ready to be copied to its output.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedChannel {
    pub samples: Vec<f32>,
    /// Trailing samples dropped to fit the destination.
    pub dropped: usize,
}

/// Runs extract, reference, filter, degap, trim and fit for the channels of
/// one `compute_signals` call. Common references live as long as the
/// pipeline.
pub struct DerivationPipeline<'a> {
    buffers: &'a [Arc<SignalBuffer>],
    defaults: &'a DefaultFilters,
    coefficients: &'a mut CoefficientCache,
    references: ReferenceComputer,
    logger: LogManager,
}

impl<'a> DerivationPipeline<'a> {
    pub fn new(
        buffers: &'a [Arc<SignalBuffer>],
        defaults: &'a DefaultFilters,
        coefficients: &'a mut CoefficientCache,
    ) -> Self {
        Self {
            buffers,
            defaults,
            coefficients,
            references: ReferenceComputer::new(),
            logger: LogManager::new("pipeline"),
        }
    }

    pub fn references_computed(&self) -> usize {
        self.references.computed()
    }

    pub fn derive(
        &mut self,
        index: usize,
        channel: &ChannelDefinition,
        capacity: usize,
    ) -> StageResult<DerivedChannel> {
        channel
            .validate(self.buffers.len())
            .map_err(StageError::Configuration)?;
        let active = &self.buffers[channel.active];

        let mut samples =
            WindowExtractor::extract(active, channel.start, channel.end, &channel.data_gaps);
        {
            let reference = self.references.reference(channel, self.buffers)?;
            if reference.len() != samples.len() {
                return Err(StageError::InvalidInput(format!(
                    "reference has {} samples, active signal {}",
                    reference.len(),
                    samples.len()
                )));
            }
            for (sample, offset) in samples.iter_mut().zip(reference.iter()) {
                *sample -= offset;
            }
        }

        let specs = channel.resolve_filters(self.defaults);
        let mut frame = ChannelFrame::new(samples, active.sampling_rate());
        let mut stages: Vec<Box<dyn ProcessingStage + '_>> = vec![
            Box::new(FilterStage::new(self.coefficients, specs)),
            Box::new(DegapStage::new(&channel.data_gaps)),
            Box::new(TrimStage::new(
                channel.filter_len,
                channel.trim_start,
                channel.trim_end,
            )),
        ];
        for stage in stages.iter_mut() {
            frame = stage.execute(frame).map_err(|err| {
                self.logger
                    .warn(&format!("channel {} failed in {}: {}", index, stage.name(), err));
                err
            })?;
        }

        let mut fit = FitStage::new(capacity);
        let frame = fit.execute(frame)?;
        if fit.dropped() > 0 {
            self.logger.record(&format!(
                "channel {} dropped {} trailing sample(s) to fit {}",
                index,
                fit.dropped(),
                capacity
            ));
        }
        self.logger.debug(&format!(
            "channel {} derived {} samples, RMS {:.4}",
            index,
            frame.len(),
            StatsHelper::rms(&frame.samples)
        ));

        Ok(DerivedChannel {
            samples: frame.samples.iter().map(|&v| v as f32).collect(),
            dropped: fit.dropped(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::defaults::{FilterKind, FilterSetting};
    use crate::montage::channel::{DataGap, SignalKind};
    use std::f64::consts::PI;

    fn ramp_buffer() -> Arc<SignalBuffer> {
        let mut data = vec![0.0f32; 1000];
        for (i, slot) in data[500..600].iter_mut().enumerate() {
            *slot = i as f32;
        }
        Arc::new(SignalBuffer::from_samples(256.0, &data))
    }

    #[test]
    fn unfiltered_channel_passes_through() {
        let buffers = vec![ramp_buffer()];
        let defaults = DefaultFilters::default();
        let mut cache = CoefficientCache::new();
        let mut pipeline = DerivationPipeline::new(&buffers, &defaults, &mut cache);
        let channel = ChannelDefinition::new(0, SignalKind::Eeg).with_window(500, 600);

        let derived = pipeline.derive(0, &channel, 100).unwrap();
        let expected: Vec<f32> = (0..100).map(|v| v as f32).collect();
        assert_eq!(derived.samples, expected);
        assert_eq!(derived.dropped, 0);
    }

    #[test]
    fn gaps_without_filters_round_trip_exactly() {
        let buffers = vec![ramp_buffer()];
        let defaults = DefaultFilters::default();
        let mut cache = CoefficientCache::new();
        let mut pipeline = DerivationPipeline::new(&buffers, &defaults, &mut cache);
        let channel = ChannelDefinition::new(0, SignalKind::Eeg)
            .with_window(500, 600)
            .with_gaps(vec![DataGap(10, 30), DataGap(50, 51)]);

        let derived = pipeline.derive(0, &channel, 100).unwrap();
        let expected: Vec<f32> = (0..100).map(|v| v as f32).collect();
        assert_eq!(derived.samples, expected);
    }

    #[test]
    fn oversize_result_keeps_leading_samples() {
        let buffers = vec![ramp_buffer()];
        let defaults = DefaultFilters::default();
        let mut cache = CoefficientCache::new();
        let mut pipeline = DerivationPipeline::new(&buffers, &defaults, &mut cache);
        let channel = ChannelDefinition::new(0, SignalKind::Eeg).with_window(500, 600);

        let derived = pipeline.derive(0, &channel, 60).unwrap();
        assert_eq!(derived.dropped, 40);
        let expected: Vec<f32> = (0..60).map(|v| v as f32).collect();
        assert_eq!(derived.samples, expected);
    }

    #[test]
    fn padded_filtering_is_trimmed_back_to_window() {
        let fs = 256.0;
        let data: Vec<f32> = (0..2048)
            .map(|i| (2.0 * PI * 8.0 * i as f64 / fs).sin() as f32 + 0.5)
            .collect();
        let buffers = vec![Arc::new(SignalBuffer::from_samples(fs, &data))];
        let mut defaults = DefaultFilters::default();
        defaults.set(FilterKind::Lowpass, FilterSetting::new(30.0, None));
        let mut cache = CoefficientCache::new();
        let mut pipeline = DerivationPipeline::new(&buffers, &defaults, &mut cache);

        let mut channel = ChannelDefinition::new(0, SignalKind::Eeg);
        channel.plan_window(512, 1024, &[], 256);
        let derived = pipeline.derive(0, &channel, 512).unwrap();
        assert_eq!(derived.samples.len(), 512);

        for (i, &value) in derived.samples.iter().enumerate() {
            let expected = (2.0 * PI * 8.0 * (512 + i) as f64 / fs).sin() + 0.5;
            assert!((value as f64 - expected).abs() < 0.02, "sample {}", i);
        }
    }

    #[test]
    fn gaps_are_removed_after_filtering_and_before_trim() {
        let fs = 256.0;
        let data: Vec<f32> = (0..2048)
            .map(|i| (2.0 * PI * 8.0 * i as f64 / fs).sin() as f32 + 0.5)
            .collect();
        let buffers = vec![Arc::new(SignalBuffer::from_samples(fs, &data))];
        let mut defaults = DefaultFilters::default();
        defaults.set(FilterKind::Lowpass, FilterSetting::new(30.0, None));
        let mut cache = CoefficientCache::new();
        let mut pipeline = DerivationPipeline::new(&buffers, &defaults, &mut cache);

        let mut channel = ChannelDefinition::new(0, SignalKind::Eeg);
        channel.plan_window(512, 1024, &[DataGap(100, 140)], 256);
        assert_eq!(channel.data_gaps, vec![DataGap(356, 396)]);
        let derived = pipeline.derive(0, &channel, 512).unwrap();
        assert_eq!(derived.samples.len(), 512);
        assert_eq!(derived.dropped, 0);

        // The filter rings around the splice point; everywhere else the
        // window matches the contiguous source.
        for (i, &value) in derived.samples.iter().enumerate() {
            if (60..140).contains(&i) {
                continue;
            }
            let expected = (2.0 * PI * 8.0 * (512 + i) as f64 / fs).sin() + 0.5;
            assert!((value as f64 - expected).abs() < 0.02, "sample {}", i);
        }
    }

    #[test]
    fn invalid_channel_is_a_configuration_error() {
        let buffers = vec![ramp_buffer()];
        let defaults = DefaultFilters::default();
        let mut cache = CoefficientCache::new();
        let mut pipeline = DerivationPipeline::new(&buffers, &defaults, &mut cache);
        let channel = ChannelDefinition::new(2, SignalKind::Eeg).with_window(0, 10);
        assert!(matches!(
            pipeline.derive(0, &channel, 10),
            Err(StageError::Configuration(_))
        ));
    }
}
