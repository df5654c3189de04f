use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filters::defaults::{DefaultFilters, FilterKind, FilterSetting, FilterSpec};

/// Signal class of a derived channel. Common references are shared per kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalKind {
    Eeg,
    Meg,
    Eog,
    Ekg,
    Emg,
    Resp,
    Other(String),
}

impl SignalKind {
    pub fn as_str(&self) -> &str {
        match self {
            SignalKind::Eeg => "eeg",
            SignalKind::Meg => "meg",
            SignalKind::Eog => "eog",
            SignalKind::Ekg => "ekg",
            SignalKind::Emg => "emg",
            SignalKind::Resp => "resp",
            SignalKind::Other(label) => label,
        }
    }
}

impl From<String> for SignalKind {
    fn from(label: String) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "eeg" => SignalKind::Eeg,
            "meg" => SignalKind::Meg,
            "eog" => SignalKind::Eog,
            "ekg" | "ecg" => SignalKind::Ekg,
            "emg" => SignalKind::Emg,
            "resp" | "respiration" => SignalKind::Resp,
            _ => SignalKind::Other(label),
        }
    }
}

impl From<&str> for SignalKind {
    fn from(label: &str) -> Self {
        SignalKind::from(label.to_string())
    }
}

impl From<SignalKind> for String {
    fn from(kind: SignalKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-channel choice for one filter kind.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum FilterOverride {
    /// Use the session default.
    #[default]
    Default,
    Disabled,
    Explicit(FilterSetting),
}

impl FilterOverride {
    pub fn resolve(&self, kind: FilterKind, defaults: &DefaultFilters) -> Option<FilterSpec> {
        match self {
            FilterOverride::Default => defaults.get(kind).map(|s| FilterSpec::new(kind, s)),
            FilterOverride::Disabled => None,
            FilterOverride::Explicit(setting) if setting.is_enabled() => {
                Some(FilterSpec::new(kind, *setting))
            }
            FilterOverride::Explicit(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelFilters {
    pub highpass: FilterOverride,
    pub lowpass: FilterOverride,
    pub notch: FilterOverride,
}

impl ChannelFilters {
    pub fn get(&self, kind: FilterKind) -> FilterOverride {
        match kind {
            FilterKind::Highpass => self.highpass,
            FilterKind::Lowpass => self.lowpass,
            FilterKind::Notch => self.notch,
        }
    }

    pub fn set(&mut self, kind: FilterKind, value: FilterOverride) {
        match kind {
            FilterKind::Highpass => self.highpass = value,
            FilterKind::Lowpass => self.lowpass = value,
            FilterKind::Notch => self.notch = value,
        }
    }
}

/// Missing recording interval `[start, end)` inside a padded window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataGap(pub usize, pub usize);

impl DataGap {
    pub fn start(&self) -> usize {
        self.0
    }

    pub fn end(&self) -> usize {
        self.1
    }

    pub fn len(&self) -> usize {
        self.1.saturating_sub(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One derived channel of a montage together with its current window.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDefinition {
    pub active: usize,
    pub reference: Vec<usize>,
    pub common_ref: bool,
    pub kind: SignalKind,
    /// `None` applies every session default.
    pub filters: Option<ChannelFilters>,
    pub start: i64,
    pub end: i64,
    pub filter_len: usize,
    pub data_gaps: Vec<DataGap>,
    pub trim_start: usize,
    pub trim_end: usize,
}

impl ChannelDefinition {
    pub fn new(active: usize, kind: impl Into<SignalKind>) -> Self {
        Self {
            active,
            reference: Vec::new(),
            common_ref: false,
            kind: kind.into(),
            filters: None,
            start: 0,
            end: 0,
            filter_len: 0,
            data_gaps: Vec::new(),
            trim_start: 0,
            trim_end: 0,
        }
    }

    pub fn with_reference(mut self, reference: Vec<usize>) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_common_ref(mut self, common_ref: bool) -> Self {
        self.common_ref = common_ref;
        self
    }

    pub fn with_filters(mut self, filters: ChannelFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_window(mut self, start: i64, end: i64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_gaps(mut self, data_gaps: Vec<DataGap>) -> Self {
        self.data_gaps = data_gaps;
        self
    }

    pub fn window_len(&self) -> usize {
        usize::try_from(self.end.saturating_sub(self.start)).unwrap_or(0)
    }

    /// Filters to apply, highpass then lowpass then notch.
    pub fn resolve_filters(&self, defaults: &DefaultFilters) -> Vec<FilterSpec> {
        let filters = self.filters.unwrap_or_default();
        FilterKind::ORDERED
            .iter()
            .filter_map(|&kind| filters.get(kind).resolve(kind, defaults))
            .collect()
    }

    /// Sets the window to `[start, end)` widened by `padding` samples on each
    /// side, with `gaps` given relative to the unpadded window.
    pub fn plan_window(&mut self, start: i64, end: i64, gaps: &[DataGap], padding: usize) {
        let pad = padding as i64;
        self.start = start.saturating_sub(pad);
        self.end = end.saturating_add(pad);
        self.filter_len = padding;
        self.data_gaps = gaps
            .iter()
            .map(|gap| DataGap(gap.0.saturating_add(padding), gap.1.saturating_add(padding)))
            .collect();
        self.trim_start = padding;
        self.trim_end = self.window_len().saturating_sub(padding);
    }

    /// Structural checks against `buffer_count` attached inputs.
    pub fn validate(&self, buffer_count: usize) -> Result<(), String> {
        if self.active >= buffer_count {
            return Err(format!(
                "active input {} is out of range for {} buffer(s)",
                self.active, buffer_count
            ));
        }
        if let Some(bad) = self.reference.iter().find(|&&idx| idx >= buffer_count) {
            return Err(format!(
                "reference input {} is out of range for {} buffer(s)",
                bad, buffer_count
            ));
        }
        if self.end < self.start {
            return Err(format!(
                "window end {} precedes start {}",
                self.end, self.start
            ));
        }
        if self.end.checked_sub(self.start).is_none() {
            return Err(format!(
                "window [{}, {}) spans more samples than can be addressed",
                self.start, self.end
            ));
        }

        let window = self.window_len();
        let mut previous_end = 0;
        for gap in &self.data_gaps {
            if gap.start() > gap.end() || gap.start() < previous_end || gap.end() > window {
                return Err(format!(
                    "data gap [{}, {}) is unordered or outside window of {} samples",
                    gap.start(),
                    gap.end(),
                    window
                ));
            }
            previous_end = gap.end();
        }

        if self.filter_len > 0 && (self.trim_start > self.trim_end || self.trim_end > window) {
            return Err(format!(
                "trim range [{}, {}) does not fit window of {} samples",
                self.trim_start, self.trim_end, window
            ));
        }
        Ok(())
    }
}
