use crate::filters::cache::CoefficientCache;
use crate::filters::defaults::FilterSpec;
use crate::filters::sos::sosfiltfilt;
use crate::montage::channel::DataGap;
use crate::prelude::{ChannelFrame, ProcessingStage, StageError, StageResult};
use crate::processing::extract::WindowExtractor;

/// Zero-phase Butterworth filtering with cached coefficients.
pub struct FilterStage<'a> {
    cache: &'a mut CoefficientCache,
    specs: Vec<FilterSpec>,
}

impl<'a> FilterStage<'a> {
    pub fn new(cache: &'a mut CoefficientCache, specs: Vec<FilterSpec>) -> Self {
        Self { cache, specs }
    }
}

impl ProcessingStage for FilterStage<'_> {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn execute(&mut self, mut frame: ChannelFrame) -> StageResult<ChannelFrame> {
        for spec in &self.specs {
            let sos = self.cache.get(spec, frame.sampling_rate).map_err(|err| {
                StageError::FilterDesign(format!(
                    "{} at {} Hz (order {}, fs {} Hz): {}",
                    spec.kind.as_str(),
                    spec.wn,
                    spec.effective_order(),
                    frame.sampling_rate,
                    err
                ))
            })?;
            frame.samples = sosfiltfilt(&sos, &frame.samples);
        }
        Ok(frame)
    }
}

/// Removes the zero stretches that stood in for recording gaps.
pub struct DegapStage<'a> {
    gaps: &'a [DataGap],
}

impl<'a> DegapStage<'a> {
    pub fn new(gaps: &'a [DataGap]) -> Self {
        Self { gaps }
    }
}

impl ProcessingStage for DegapStage<'_> {
    fn name(&self) -> &'static str {
        "degap"
    }

    fn execute(&mut self, mut frame: ChannelFrame) -> StageResult<ChannelFrame> {
        let gap_total: usize = self.gaps.iter().map(DataGap::len).sum();
        if gap_total > frame.len() {
            return Err(StageError::InvalidInput(format!(
                "{} gap samples exceed signal of {}",
                gap_total,
                frame.len()
            )));
        }
        WindowExtractor::remove_gaps(&mut frame.samples, self.gaps);
        Ok(frame)
    }
}

/// Drops the filter padding, keeping `[start, end)`.
pub struct TrimStage {
    range: Option<(usize, usize)>,
}

impl TrimStage {
    /// No trimming happens when `filter_len` is zero.
    pub fn new(filter_len: usize, trim_start: usize, trim_end: usize) -> Self {
        Self {
            range: (filter_len > 0).then_some((trim_start, trim_end)),
        }
    }
}

impl ProcessingStage for TrimStage {
    fn name(&self) -> &'static str {
        "trim"
    }

    fn execute(&mut self, mut frame: ChannelFrame) -> StageResult<ChannelFrame> {
        let Some((start, end)) = self.range else {
            return Ok(frame);
        };
        if start > end || end > frame.len() {
            return Err(StageError::InvalidInput(format!(
                "trim range [{}, {}) exceeds signal of {}",
                start,
                end,
                frame.len()
            )));
        }
        frame.samples.truncate(end);
        frame.samples.drain(..start);
        Ok(frame)
    }
}

/// Best-effort fit into the destination: excess samples are dropped from
/// the end, never the start.
pub struct FitStage {
    capacity: usize,
    dropped: usize,
}

impl FitStage {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            dropped: 0,
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl ProcessingStage for FitStage {
    fn name(&self) -> &'static str {
        "fit"
    }

    fn execute(&mut self, mut frame: ChannelFrame) -> StageResult<ChannelFrame> {
        self.dropped = frame.len().saturating_sub(self.capacity);
        frame.samples.truncate(self.capacity);
        Ok(frame)
    }
}
