use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::signal::SignalBuffer;
use crate::math::stats::StatsHelper;
use crate::montage::channel::{ChannelDefinition, DataGap, SignalKind};
use crate::prelude::{StageError, StageResult};
use crate::processing::extract::WindowExtractor;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CommonRefKey {
    kind: SignalKind,
    start: i64,
    end: i64,
    gaps: Vec<DataGap>,
}

#[derive(Debug)]
struct CommonRef {
    sources: Vec<usize>,
    signal: Vec<f64>,
}

/// Builds reference signals for one `compute_signals` call.
///
/// Channels flagged `common_ref` share one reference per signal kind and
/// window; a channel of the same kind and window that names different
/// sources is rejected rather than given a mismatched reference.
#[derive(Debug, Default)]
pub struct ReferenceComputer {
    common: HashMap<CommonRefKey, CommonRef>,
    computed: usize,
}

impl ReferenceComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of references built from raw buffers so far.
    pub fn computed(&self) -> usize {
        self.computed
    }

    pub fn reference(
        &mut self,
        channel: &ChannelDefinition,
        buffers: &[Arc<SignalBuffer>],
    ) -> StageResult<Cow<'_, [f64]>> {
        if !channel.common_ref {
            return self.build(channel, buffers).map(Cow::Owned);
        }

        let key = CommonRefKey {
            kind: channel.kind.clone(),
            start: channel.start,
            end: channel.end,
            gaps: channel.data_gaps.clone(),
        };
        if !self.common.contains_key(&key) {
            let signal = self.build(channel, buffers)?;
            self.common.insert(
                key.clone(),
                CommonRef {
                    sources: channel.reference.clone(),
                    signal,
                },
            );
        }

        let shared = &self.common[&key];
        if shared.sources != channel.reference {
            return Err(StageError::Configuration(format!(
                "common {} reference uses inputs {:?} but this channel lists {:?}",
                channel.kind, shared.sources, channel.reference
            )));
        }
        Ok(Cow::Borrowed(&shared.signal))
    }

    fn build(
        &mut self,
        channel: &ChannelDefinition,
        buffers: &[Arc<SignalBuffer>],
    ) -> StageResult<Vec<f64>> {
        let gap_total: usize = channel.data_gaps.iter().map(DataGap::len).sum();
        let length = channel.window_len() + gap_total;

        let sampling_rate = buffers
            .get(channel.active)
            .map(|buffer| buffer.sampling_rate())
            .ok_or_else(|| {
                StageError::Configuration(format!("active input {} is not attached", channel.active))
            })?;

        let mut windows = Vec::with_capacity(channel.reference.len());
        for &source in &channel.reference {
            let buffer = buffers.get(source).ok_or_else(|| {
                StageError::Configuration(format!("reference input {} is not attached", source))
            })?;
            if buffer.sampling_rate() != sampling_rate {
                return Err(StageError::Configuration(format!(
                    "reference input {} samples at {} Hz, active input at {} Hz",
                    source,
                    buffer.sampling_rate(),
                    sampling_rate
                )));
            }
            windows.push(WindowExtractor::extract(
                buffer,
                channel.start,
                channel.end,
                &channel.data_gaps,
            ));
        }
        self.computed += 1;

        Ok(match windows.len() {
            0 => vec![0.0; length],
            1 => windows.swap_remove(0),
            _ => StatsHelper::mean_across(&windows),
        })
    }
}
