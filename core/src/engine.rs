use std::sync::Arc;

use crate::buffer::gate::FreshnessGate;
use crate::buffer::output::OutputBuffer;
use crate::buffer::signal::SignalBuffer;
use crate::config::{CacheScope, EngineConfig};
use crate::filters::cache::CoefficientCache;
use crate::filters::defaults::{DefaultFilters, FilterKind, FilterSetting};
use crate::montage::channel::{ChannelDefinition, ChannelFilters, DataGap};
use crate::montage::registry::MontageRegistry;
use crate::prelude::{ChannelFailure, DerivationError, DerivationResult};
use crate::processing::pipeline::DerivationPipeline;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{MetricsRecorder, MetricsSnapshot};

/// Outcome of a successful `compute_signals` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivationSummary {
    /// Montage channel indices written, in selection order.
    pub channels: Vec<usize>,
    /// Samples dropped across all channels to fit their outputs.
    pub dropped: usize,
    pub references_computed: usize,
}

/// Session object holding everything a host configures between calls:
/// attached buffers, montages, default filters and the optional
/// session-lifetime coefficient cache.
///
/// Calls are synchronous and never wait for data. A range the producer has
/// not published yet fails the whole call with
/// [`DerivationError::NotReady`] and the host retries later.
pub struct DerivationEngine {
    config: EngineConfig,
    buffers: Vec<Arc<SignalBuffer>>,
    outputs: Vec<Arc<OutputBuffer>>,
    registry: MontageRegistry,
    session_cache: CoefficientCache,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl DerivationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            buffers: Vec::new(),
            outputs: Vec::new(),
            registry: MontageRegistry::new(),
            session_cache: CoefficientCache::new(),
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("engine"),
        }
    }

    pub fn set_buffers(&mut self, buffers: Vec<Arc<SignalBuffer>>) -> DerivationResult<()> {
        if let Some((index, buffer)) = buffers
            .iter()
            .enumerate()
            .find(|(_, buffer)| !(buffer.sampling_rate().is_finite() && buffer.sampling_rate() > 0.0))
        {
            return Err(DerivationError::Configuration(format!(
                "input buffer {} has invalid sampling rate {}",
                index,
                buffer.sampling_rate()
            )));
        }
        self.logger
            .debug(&format!("attached {} input buffer(s)", buffers.len()));
        self.buffers = buffers;
        self.replan_windows();
        Ok(())
    }

    pub fn set_outputs(&mut self, outputs: Vec<Arc<OutputBuffer>>) -> DerivationResult<()> {
        self.logger
            .debug(&format!("attached {} output buffer(s)", outputs.len()));
        self.outputs = outputs;
        Ok(())
    }

    /// Registers or overwrites a montage.
    pub fn add_montage(&mut self, name: &str, channels: Vec<ChannelDefinition>) -> DerivationResult<()> {
        if name.is_empty() {
            return Err(DerivationError::Configuration(
                "montage name must not be empty".into(),
            ));
        }
        self.logger
            .record(&format!("montage `{}` with {} channel(s)", name, channels.len()));
        self.registry.add(name, channels);
        Ok(())
    }

    pub fn set_active_montage(&mut self, name: &str) -> DerivationResult<()> {
        self.registry.set_active(name)
    }

    pub fn set_montage_filters(
        &mut self,
        name: &str,
        filters: Vec<Option<ChannelFilters>>,
    ) -> DerivationResult<()> {
        self.registry.set_filters(name, filters)?;
        self.replan_windows();
        Ok(())
    }

    /// Sets the session default for `kind`; `wn == 0` disables it.
    pub fn set_default_filter(
        &mut self,
        kind: FilterKind,
        wn: f64,
        order: Option<usize>,
    ) -> DerivationResult<()> {
        if !wn.is_finite() || wn < 0.0 {
            return Err(DerivationError::Configuration(format!(
                "{} critical frequency {} is invalid",
                kind.as_str(),
                wn
            )));
        }
        if order == Some(0) {
            return Err(DerivationError::Configuration(format!(
                "{} order must be positive",
                kind.as_str()
            )));
        }
        self.config.filters.set(kind, FilterSetting::new(wn, order));
        self.replan_windows();
        Ok(())
    }

    pub fn set_filter_padding(&mut self, seconds: f64) -> DerivationResult<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(DerivationError::Configuration(format!(
                "filter padding {} s is invalid",
                seconds
            )));
        }
        self.config.filters.padding_secs = seconds;
        self.replan_windows();
        Ok(())
    }

    /// Points every channel of `name` at `[start, end)`, padded for filtering
    /// at each channel's sampling rate. `gaps` are relative to `start`.
    ///
    /// The request is kept, so later filter, padding or buffer changes
    /// re-plan the padding.
    pub fn set_montage_window(
        &mut self,
        name: &str,
        start: i64,
        end: i64,
        gaps: &[DataGap],
    ) -> DerivationResult<()> {
        if end < start {
            return Err(DerivationError::Configuration(format!(
                "window end {} precedes start {}",
                end, start
            )));
        }
        let defaults = &self.config.filters;
        let buffers = &self.buffers;
        self.registry.set_window(name, start, end, gaps, |channel| {
            padding_samples(defaults, buffers, channel)
        })
    }

    fn replan_windows(&mut self) {
        let defaults = &self.config.filters;
        let buffers = &self.buffers;
        self.registry
            .replan(|channel| padding_samples(defaults, buffers, channel));
    }

    /// Derives the selected channels of the active montage into the attached
    /// outputs, in selection order. An empty selection derives every channel.
    ///
    /// Channels that fail are reported together in
    /// [`DerivationError::ChannelFailures`]; the others are still written.
    pub fn compute_signals(&mut self, selection: &[usize]) -> DerivationResult<DerivationSummary> {
        if self.buffers.is_empty() {
            return Err(DerivationError::Configuration(
                "no input buffers are set".into(),
            ));
        }
        if self.outputs.is_empty() {
            return Err(DerivationError::Configuration(
                "no output buffers are set".into(),
            ));
        }
        let montage = self
            .registry
            .active()
            .ok_or_else(|| DerivationError::Configuration("no active montage".into()))?;

        let selection: Vec<usize> = if selection.is_empty() {
            (0..montage.channels.len()).collect()
        } else {
            selection.to_vec()
        };
        if let Some(&bad) = selection.iter().find(|&&idx| idx >= montage.channels.len()) {
            return Err(DerivationError::Configuration(format!(
                "channel {} is out of range for montage `{}` with {} channel(s)",
                bad,
                montage.name,
                montage.channels.len()
            )));
        }
        if selection.len() != self.outputs.len() {
            return Err(DerivationError::SizeMismatch {
                expected: selection.len(),
                actual: self.outputs.len(),
            });
        }

        for &idx in &selection {
            let channel = &montage.channels[idx];
            channel.validate(self.buffers.len()).map_err(|msg| {
                DerivationError::Configuration(format!("channel {}: {}", idx, msg))
            })?;
        }

        for &idx in &selection {
            let channel = &montage.channels[idx];
            for source in std::iter::once(channel.active).chain(channel.reference.iter().copied()) {
                if let Err(reason) =
                    FreshnessGate::check(&self.buffers[source], channel.start, channel.end)
                {
                    self.metrics.record_not_ready();
                    self.logger.warn(&format!(
                        "channel {} waits on input {}: {}",
                        idx, source, reason
                    ));
                    return Err(DerivationError::NotReady {
                        buffer: source,
                        reason,
                    });
                }
            }
        }

        let mut call_cache = CoefficientCache::new();
        let cache = match self.config.cache_scope {
            CacheScope::Call => &mut call_cache,
            CacheScope::Session => &mut self.session_cache,
        };
        let designs_before = cache.designs();

        let mut summary = DerivationSummary::default();
        let mut failures = Vec::new();
        {
            let mut pipeline = DerivationPipeline::new(&self.buffers, &self.config.filters, &mut *cache);
            for (slot, &idx) in selection.iter().enumerate() {
                let output = &self.outputs[slot];
                match pipeline.derive(idx, &montage.channels[idx], output.capacity()) {
                    Ok(derived) => {
                        output.write(&derived.samples);
                        self.metrics.record_derived();
                        summary.channels.push(idx);
                        summary.dropped += derived.dropped;
                    }
                    Err(error) => {
                        self.metrics.record_failed();
                        failures.push(ChannelFailure {
                            channel: idx,
                            error,
                        });
                    }
                }
            }
            summary.references_computed = pipeline.references_computed();
        }
        self.metrics
            .record_designs(cache.designs().saturating_sub(designs_before));

        self.logger.record(&format!(
            "montage `{}`: {} channel(s) derived, {} failed",
            montage.name,
            summary.channels.len(),
            failures.len()
        ));
        if failures.is_empty() {
            Ok(summary)
        } else {
            Err(DerivationError::ChannelFailures(failures))
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn registry(&self) -> &MontageRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn buffers(&self) -> &[Arc<SignalBuffer>] {
        &self.buffers
    }

    pub fn outputs(&self) -> &[Arc<OutputBuffer>] {
        &self.outputs
    }
}

impl Default for DerivationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Filter padding for `channel`: none when it resolves no filter or its
/// active input is not attached yet.
fn padding_samples(
    defaults: &DefaultFilters,
    buffers: &[Arc<SignalBuffer>],
    channel: &ChannelDefinition,
) -> usize {
    if channel.resolve_filters(defaults).is_empty() {
        return 0;
    }
    buffers
        .get(channel.active)
        .map(|buffer| defaults.padding_samples(buffer.sampling_rate()))
        .unwrap_or(0)
}
