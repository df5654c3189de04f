use serde::{Deserialize, Serialize};

/// Half width of the band rejected by a notch filter, in Hz.
pub const NOTCH_HALF_WIDTH_HZ: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Highpass,
    Lowpass,
    Notch,
}

impl FilterKind {
    /// Application order of filters on a channel.
    pub const ORDERED: [FilterKind; 3] = [FilterKind::Highpass, FilterKind::Lowpass, FilterKind::Notch];

    /// Order used when a filter does not name one. Notches are realized as
    /// bandstops, which need more sections for a comparable slope.
    pub fn default_order(self) -> usize {
        match self {
            FilterKind::Highpass | FilterKind::Lowpass => 6,
            FilterKind::Notch => 9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::Highpass => "highpass",
            FilterKind::Lowpass => "lowpass",
            FilterKind::Notch => "notch",
        }
    }
}

/// Critical frequency and optional order of one filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSetting {
    #[serde(alias = "Wn")]
    pub wn: f64,
    #[serde(default, alias = "N", skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
}

impl FilterSetting {
    pub fn new(wn: f64, order: Option<usize>) -> Self {
        Self { wn, order }
    }

    /// A zero (or non-positive) critical frequency switches the filter off.
    pub fn is_enabled(&self) -> bool {
        self.wn > 0.0
    }
}

/// A fully resolved filter to apply to one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub wn: f64,
    pub order: Option<usize>,
}

impl FilterSpec {
    pub fn new(kind: FilterKind, setting: FilterSetting) -> Self {
        Self {
            kind,
            wn: setting.wn,
            order: setting.order,
        }
    }

    pub fn effective_order(&self) -> usize {
        self.order.unwrap_or_else(|| self.kind.default_order())
    }
}

/// Session-wide filters applied to channels without an explicit override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultFilters {
    pub highpass: Option<FilterSetting>,
    pub lowpass: Option<FilterSetting>,
    pub notch: Option<FilterSetting>,
    /// Signal added before and after a requested window for filtering.
    pub padding_secs: f64,
}

impl DefaultFilters {
    pub fn get(&self, kind: FilterKind) -> Option<FilterSetting> {
        let setting = match kind {
            FilterKind::Highpass => self.highpass,
            FilterKind::Lowpass => self.lowpass,
            FilterKind::Notch => self.notch,
        };
        setting.filter(FilterSetting::is_enabled)
    }

    /// Replaces the default for `kind`; a zero `wn` disables it.
    pub fn set(&mut self, kind: FilterKind, setting: FilterSetting) {
        let value = Some(setting).filter(FilterSetting::is_enabled);
        match kind {
            FilterKind::Highpass => self.highpass = value,
            FilterKind::Lowpass => self.lowpass = value,
            FilterKind::Notch => self.notch = value,
        }
    }

    pub fn padding_samples(&self, sampling_rate: f64) -> usize {
        let samples = (self.padding_secs * sampling_rate).round();
        if samples.is_finite() && samples > 0.0 {
            samples as usize
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_wn_disables_default() {
        let mut defaults = DefaultFilters::default();
        defaults.set(FilterKind::Lowpass, FilterSetting::new(40.0, None));
        assert_eq!(defaults.get(FilterKind::Lowpass).map(|s| s.wn), Some(40.0));

        defaults.set(FilterKind::Lowpass, FilterSetting::new(0.0, Some(4)));
        assert!(defaults.get(FilterKind::Lowpass).is_none());
    }

    #[test]
    fn effective_order_falls_back_per_kind() {
        let notch = FilterSpec::new(FilterKind::Notch, FilterSetting::new(50.0, None));
        let highpass = FilterSpec::new(FilterKind::Highpass, FilterSetting::new(0.5, Some(2)));
        assert_eq!(notch.effective_order(), 9);
        assert_eq!(highpass.effective_order(), 2);
    }

    #[test]
    fn padding_converts_with_sampling_rate() {
        let defaults = DefaultFilters {
            padding_secs: 1.5,
            ..Default::default()
        };
        assert_eq!(defaults.padding_samples(256.0), 384);
        assert_eq!(DefaultFilters::default().padding_samples(256.0), 0);
    }

    #[test]
    fn defaults_deserialize_from_json() {
        let defaults: DefaultFilters = serde_json::from_str(
            r#"{"highpass": {"wn": 0.3}, "notch": {"wn": 50.0, "order": 4}, "padding_secs": 2.0}"#,
        )
        .unwrap();
        assert_eq!(defaults.get(FilterKind::Notch).and_then(|s| s.order), Some(4));
        assert!(defaults.lowpass.is_none());
        assert_eq!(defaults.padding_secs, 2.0);
    }
}
