use crate::generator::profile::build_recording;
use crate::workflow::config::WorkflowConfig;
use anyhow::{bail, Context};
use log::{debug, info};
use montagecore::buffer::{OutputBuffer, SignalBuffer};
use montagecore::engine::{DerivationEngine, DerivationSummary};
use montagecore::math::StatsHelper;
use montagecore::montage::ChannelDefinition;
use montagecore::prelude::DerivationError;
use montagecore::telemetry::MetricsSnapshot;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: usize,
    pub samples: usize,
    pub rms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub montage: String,
    pub mode: &'static str,
    pub channels: Vec<ChannelReport>,
    pub dropped: usize,
    /// `compute_signals` calls that came back not ready before success.
    pub not_ready_retries: usize,
    pub metrics: MetricsSnapshot,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    fn build_engine(
        &self,
        buffers: Vec<Arc<SignalBuffer>>,
    ) -> anyhow::Result<(DerivationEngine, Vec<Arc<OutputBuffer>>)> {
        let mut engine = DerivationEngine::new(self.config.engine.clone());
        engine
            .set_buffers(buffers)
            .context("attaching input buffers")?;
        for (name, channels) in &self.config.montages {
            let channels = channels.iter().cloned().map(ChannelDefinition::from).collect();
            engine
                .add_montage(name, channels)
                .with_context(|| format!("registering montage {}", name))?;
        }
        let active = &self.config.active_montage;
        engine
            .set_active_montage(active)
            .with_context(|| format!("activating montage {}", active))?;

        let (start, end) = self
            .config
            .window
            .to_samples(self.config.recording.sampling_rate);
        engine
            .set_montage_window(active, start, end, &self.config.window.gaps)
            .context("planning montage window")?;

        let capacity = usize::try_from(end.saturating_sub(start)).unwrap_or(0);
        let outputs: Vec<Arc<OutputBuffer>> = (0..self.config.output_count())
            .map(|_| Arc::new(OutputBuffer::with_capacity(capacity)))
            .collect();
        engine
            .set_outputs(outputs.clone())
            .context("attaching output buffers")?;
        Ok((engine, outputs))
    }

    fn report(
        &self,
        mode: &'static str,
        engine: &DerivationEngine,
        summary: DerivationSummary,
        outputs: &[Arc<OutputBuffer>],
        not_ready_retries: usize,
    ) -> WorkflowResult {
        let channels = summary
            .channels
            .iter()
            .zip(outputs)
            .map(|(&channel, output)| {
                let samples: Vec<f64> = output.snapshot().iter().map(|&v| v as f64).collect();
                ChannelReport {
                    channel,
                    samples: samples.len(),
                    rms: StatsHelper::rms(&samples),
                }
            })
            .collect();
        WorkflowResult {
            montage: self.config.active_montage.clone(),
            mode,
            channels,
            dropped: summary.dropped,
            not_ready_retries,
            metrics: engine.metrics(),
        }
    }

    /// Derives the montage from a recording that is already fully written.
    pub fn execute_offline(&self) -> anyhow::Result<WorkflowResult> {
        let recording = build_recording(&self.config.recording)?;
        let (mut engine, outputs) = self.build_engine(recording.to_buffers())?;
        let summary = engine
            .compute_signals(&self.config.selection)
            .context("deriving montage")?;
        info!(
            "offline run derived {} channel(s) of {}",
            summary.channels.len(),
            self.config.active_montage
        );
        Ok(self.report("offline", &engine, summary, &outputs, 0))
    }

    /// Streams the recording into empty buffers `chunk` samples per tick and
    /// polls the engine until the requested window has been published.
    pub async fn execute_live(&self, chunk: usize) -> anyhow::Result<WorkflowResult> {
        let recording = build_recording(&self.config.recording)?;
        let buffers = recording.empty_buffers();
        let (mut engine, outputs) = self.build_engine(buffers.clone())?;

        let tick = Duration::from_millis(self.config.live.tick_ms.max(1));
        let producer = tokio::spawn(produce(buffers, recording.channels, chunk.max(1), tick));

        let mut poll = tokio::time::interval(tick);
        let mut retries = 0;
        let summary = loop {
            poll.tick().await;
            let producer_done = producer.is_finished();
            match engine.compute_signals(&self.config.selection) {
                Ok(summary) => break summary,
                Err(DerivationError::NotReady { buffer, reason }) => {
                    if producer_done {
                        bail!("input {} still not ready after the recording ended: {}", buffer, reason);
                    }
                    retries += 1;
                    debug!("input {} not ready ({}), retrying", buffer, reason);
                }
                Err(err) => return Err(err).context("deriving montage"),
            }
        };
        producer.await.context("joining producer task")??;

        info!(
            "live run derived {} channel(s) of {} after {} retries",
            summary.channels.len(),
            self.config.active_montage,
            retries
        );
        Ok(self.report("live", &engine, summary, &outputs, retries))
    }
}

async fn produce(
    buffers: Vec<Arc<SignalBuffer>>,
    channels: Vec<Vec<f32>>,
    chunk: usize,
    tick: Duration,
) -> anyhow::Result<()> {
    let total = channels.first().map(Vec::len).unwrap_or(0);
    let mut ticker = tokio::time::interval(tick);
    let mut offset = 0;
    while offset < total {
        ticker.tick().await;
        let end = (offset + chunk).min(total);
        for (buffer, samples) in buffers.iter().zip(&channels) {
            buffer
                .write(offset, &samples[offset..end])
                .with_context(|| format!("publishing samples {}..{}", offset, end))?;
        }
        offset = end;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_executes_offline_workflow() {
        let cfg = WorkflowConfig::default();
        let runner = Runner::new(cfg.clone());
        let result = runner.execute_offline().unwrap();
        assert_eq!(result.channels.len(), 3);
        assert!(result.channels.iter().all(|c| c.samples == 1024));
        assert_eq!(result.metrics.derived, 3);
        assert_eq!(result.metrics.designs, 3);
        // 10 Hz tone of unit amplitude survives 0.5-40 Hz band and 50 Hz notch.
        assert!(result.channels[0].rms > 0.6 && result.channels[0].rms < 0.8);
    }

    #[test]
    fn unknown_active_montage_fails_with_context() {
        let cfg = WorkflowConfig {
            active_montage: "missing".into(),
            ..WorkflowConfig::default()
        };
        let err = Runner::new(cfg).execute_offline().unwrap_err();
        assert!(err.to_string().contains("activating montage missing"));
    }

    #[tokio::test]
    async fn live_run_matches_offline_after_retries() {
        let mut cfg = WorkflowConfig::default();
        cfg.live.tick_ms = 1;
        let runner = Runner::new(cfg);
        let offline = runner.execute_offline().unwrap();
        let live = runner.execute_live(256).await.unwrap();

        assert!(live.not_ready_retries >= 1);
        assert_eq!(live.metrics.not_ready, live.not_ready_retries);
        assert_eq!(live.channels.len(), offline.channels.len());
        for (a, b) in live.channels.iter().zip(&offline.channels) {
            assert_eq!(a.rms, b.rms);
        }
    }
}
