//! Host-facing surface: every operation returns an [`OperationResult`] and
//! no error or panic escapes to the caller.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::buffer::output::OutputBuffer;
use crate::buffer::signal::SignalBuffer;
use crate::config::EngineConfig;
use crate::engine::DerivationEngine;
use crate::filters::defaults::{FilterKind, FilterSetting};
use crate::montage::channel::{ChannelDefinition, ChannelFilters, DataGap, FilterOverride, SignalKind};
use crate::prelude::{DerivationError, DerivationResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Single(String),
    Many(Vec<String>),
}

/// `{ "success": bool, "error"?: string | [string] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl OperationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(err: &DerivationError) -> Self {
        let mut messages = err.messages();
        let detail = if messages.len() == 1 {
            ErrorDetail::Single(messages.remove(0))
        } else {
            ErrorDetail::Many(messages)
        };
        Self {
            success: false,
            error: Some(detail),
        }
    }

    pub fn from_result<T>(result: DerivationResult<T>) -> Self {
        match result {
            Ok(_) => Self::ok(),
            Err(err) => Self::failure(&err),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            format!("{{\"success\":false,\"error\":\"{}\"}}", err)
        })
    }
}

/// Filter value as a host sends it: a bare critical frequency or an object
/// with `wn`/`Wn` and optional `order`/`N`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValueInput {
    Frequency(f64),
    Setting(FilterSetting),
}

impl FilterValueInput {
    fn setting(self) -> FilterSetting {
        match self {
            FilterValueInput::Frequency(wn) => FilterSetting::new(wn, None),
            FilterValueInput::Setting(setting) => setting,
        }
    }
}

/// Per-channel filter object. A missing kind is skipped, `null` falls back
/// to the session default and `0` disables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct FilterOverridesInput {
    #[serde(default, deserialize_with = "present")]
    pub highpass: Option<Option<FilterValueInput>>,
    #[serde(default, deserialize_with = "present")]
    pub lowpass: Option<Option<FilterValueInput>>,
    #[serde(default, deserialize_with = "present")]
    pub notch: Option<Option<FilterValueInput>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<FilterValueInput>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<FilterValueInput>::deserialize(deserializer).map(Some)
}

impl FilterOverridesInput {
    pub fn to_filters(self) -> ChannelFilters {
        let mut filters = ChannelFilters::default();
        for (kind, value) in [
            (FilterKind::Highpass, self.highpass),
            (FilterKind::Lowpass, self.lowpass),
            (FilterKind::Notch, self.notch),
        ] {
            let choice = match value {
                None => FilterOverride::Disabled,
                Some(None) => FilterOverride::Default,
                Some(Some(value)) => {
                    let setting = value.setting();
                    if setting.is_enabled() {
                        FilterOverride::Explicit(setting)
                    } else {
                        FilterOverride::Disabled
                    }
                }
            };
            filters.set(kind, choice);
        }
        filters
    }
}

/// Channel definition as received from the host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelDefinitionInput {
    pub active: usize,
    #[serde(default)]
    pub reference: Vec<usize>,
    #[serde(default, alias = "commonRef")]
    pub common_ref: bool,
    #[serde(rename = "type")]
    pub kind: SignalKind,
    #[serde(default)]
    pub filters: Option<FilterOverridesInput>,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default, alias = "filterLen")]
    pub filter_len: usize,
    #[serde(default, alias = "dataGaps")]
    pub data_gaps: Vec<DataGap>,
    #[serde(default, alias = "trimStart")]
    pub trim_start: usize,
    #[serde(default, alias = "trimEnd")]
    pub trim_end: usize,
}

impl From<ChannelDefinitionInput> for ChannelDefinition {
    fn from(input: ChannelDefinitionInput) -> Self {
        ChannelDefinition {
            active: input.active,
            reference: input.reference,
            common_ref: input.common_ref,
            kind: input.kind,
            filters: input.filters.map(FilterOverridesInput::to_filters),
            start: input.start,
            end: input.end,
            filter_len: input.filter_len,
            data_gaps: input.data_gaps,
            trim_start: input.trim_start,
            trim_end: input.trim_end,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("internal error: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("internal error: {}", msg)
    } else {
        "internal error".to_string()
    }
}

/// Wraps a [`DerivationEngine`] for hosts that speak in plain values.
pub struct HostBridge {
    engine: DerivationEngine,
}

impl HostBridge {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: DerivationEngine::new(config),
        }
    }

    pub fn engine(&self) -> &DerivationEngine {
        &self.engine
    }

    fn guarded<T, F>(&mut self, op: F) -> OperationResult
    where
        F: FnOnce(&mut DerivationEngine) -> DerivationResult<T>,
    {
        let engine = &mut self.engine;
        match catch_unwind(AssertUnwindSafe(|| op(engine))) {
            Ok(result) => OperationResult::from_result(result),
            Err(payload) => OperationResult {
                success: false,
                error: Some(ErrorDetail::Single(panic_message(payload))),
            },
        }
    }

    pub fn set_buffers(&mut self, buffers: Vec<Arc<SignalBuffer>>) -> OperationResult {
        self.guarded(|engine| engine.set_buffers(buffers))
    }

    pub fn set_outputs(&mut self, outputs: Vec<Arc<OutputBuffer>>) -> OperationResult {
        self.guarded(|engine| engine.set_outputs(outputs))
    }

    pub fn add_montage(&mut self, name: &str, channels: Vec<ChannelDefinitionInput>) -> OperationResult {
        self.guarded(|engine| {
            engine.add_montage(name, channels.into_iter().map(ChannelDefinition::from).collect())
        })
    }

    /// `channels` is a JSON array of channel definitions.
    pub fn add_montage_json(&mut self, name: &str, channels: &str) -> OperationResult {
        match serde_json::from_str::<Vec<ChannelDefinitionInput>>(channels) {
            Ok(channels) => self.add_montage(name, channels),
            Err(err) => OperationResult::failure(&DerivationError::Configuration(format!(
                "malformed channel definitions: {}",
                err
            ))),
        }
    }

    pub fn set_active_montage(&mut self, name: &str) -> OperationResult {
        self.guarded(|engine| engine.set_active_montage(name))
    }

    pub fn set_montage_filters(
        &mut self,
        name: &str,
        filters: Vec<Option<FilterOverridesInput>>,
    ) -> OperationResult {
        let filters = filters
            .into_iter()
            .map(|input| input.map(FilterOverridesInput::to_filters))
            .collect();
        self.guarded(|engine| engine.set_montage_filters(name, filters))
    }

    pub fn set_montage_filters_json(&mut self, name: &str, filters: &str) -> OperationResult {
        match serde_json::from_str::<Vec<Option<FilterOverridesInput>>>(filters) {
            Ok(filters) => self.set_montage_filters(name, filters),
            Err(err) => OperationResult::failure(&DerivationError::Configuration(format!(
                "malformed filter overrides: {}",
                err
            ))),
        }
    }

    /// `kind` is `highpass`, `lowpass` or `notch`.
    pub fn set_default_filter(&mut self, kind: &str, wn: f64, order: Option<usize>) -> OperationResult {
        let parsed = match kind.to_ascii_lowercase().as_str() {
            "highpass" => FilterKind::Highpass,
            "lowpass" => FilterKind::Lowpass,
            "notch" => FilterKind::Notch,
            _ => {
                return OperationResult::failure(&DerivationError::Configuration(format!(
                    "unknown filter kind `{}`",
                    kind
                )))
            }
        };
        self.guarded(|engine| engine.set_default_filter(parsed, wn, order))
    }

    pub fn set_filter_padding(&mut self, seconds: f64) -> OperationResult {
        self.guarded(|engine| engine.set_filter_padding(seconds))
    }

    pub fn set_montage_window(
        &mut self,
        name: &str,
        start: i64,
        end: i64,
        gaps: &[DataGap],
    ) -> OperationResult {
        self.guarded(|engine| engine.set_montage_window(name, start, end, gaps))
    }

    pub fn compute_signals(&mut self, selection: &[usize]) -> OperationResult {
        self.guarded(|engine| engine.compute_signals(selection))
    }
}

impl Default for HostBridge {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge_with_buffers() -> (HostBridge, Vec<Arc<OutputBuffer>>) {
        let mut bridge = HostBridge::default();
        let buffers = vec![
            Arc::new(SignalBuffer::from_samples(200.0, &[1.0; 200])),
            Arc::new(SignalBuffer::from_samples(200.0, &[0.4; 200])),
        ];
        let outputs = vec![Arc::new(OutputBuffer::with_capacity(200))];
        assert!(bridge.set_buffers(buffers).success);
        assert!(bridge.set_outputs(outputs.clone()).success);
        (bridge, outputs)
    }

    #[test]
    fn json_montage_derives_bipolar_channel() {
        let (mut bridge, outputs) = bridge_with_buffers();
        let result = bridge.add_montage_json(
            "bipolar",
            r#"[{"active": 0, "reference": [1], "type": "EEG", "start": 0, "end": 200}]"#,
        );
        assert_eq!(result, OperationResult::ok());
        assert!(bridge.set_active_montage("bipolar").success);

        let result = bridge.compute_signals(&[0]);
        assert_eq!(result.to_json(), r#"{"success":true}"#);
        assert!(outputs[0].snapshot().iter().all(|&v| (v - 0.6).abs() < 1e-6));
    }

    #[test]
    fn errors_serialize_as_single_message() {
        let mut bridge = HostBridge::default();
        let result = bridge.set_active_montage("missing");
        assert!(!result.success);
        assert_eq!(
            result.to_json(),
            r#"{"success":false,"error":"montage `missing` has not been added"}"#
        );
    }

    #[test]
    fn several_channel_failures_serialize_as_list() {
        let err = DerivationError::ChannelFailures(vec![
            crate::prelude::ChannelFailure {
                channel: 0,
                error: crate::prelude::StageError::FilterDesign("a".into()),
            },
            crate::prelude::ChannelFailure {
                channel: 2,
                error: crate::prelude::StageError::FilterDesign("b".into()),
            },
        ]);
        let result = OperationResult::failure(&err);
        assert!(matches!(result.error, Some(ErrorDetail::Many(ref list)) if list.len() == 2));
        let json: serde_json::Value = serde_json::from_str(&result.to_json()).unwrap();
        assert!(json["error"].is_array());
    }

    #[test]
    fn malformed_input_is_reported_not_raised() {
        let mut bridge = HostBridge::default();
        let result = bridge.add_montage_json("broken", r#"[{"reference": [1]}]"#);
        assert!(!result.success);
        assert!(matches!(result.error, Some(ErrorDetail::Single(ref msg)) if msg.contains("malformed")));

        assert!(!bridge.set_default_filter("bandpass", 10.0, None).success);
        assert!(!bridge.compute_signals(&[]).success);
    }

    #[test]
    fn filter_overrides_map_to_tagged_choices() {
        let inputs: Vec<Option<FilterOverridesInput>> = serde_json::from_str(
            r#"[{"highpass": 0.5, "lowpass": null, "notch": {"Wn": 60, "N": 4}}, {"notch": 0}, null]"#,
        )
        .unwrap();

        let first = inputs[0].unwrap().to_filters();
        assert_eq!(
            first.highpass,
            FilterOverride::Explicit(FilterSetting::new(0.5, None))
        );
        assert_eq!(first.lowpass, FilterOverride::Default);
        assert_eq!(
            first.notch,
            FilterOverride::Explicit(FilterSetting::new(60.0, Some(4)))
        );

        let second = inputs[1].unwrap().to_filters();
        assert_eq!(second.highpass, FilterOverride::Disabled);
        assert_eq!(second.notch, FilterOverride::Disabled);
        assert!(inputs[2].is_none());
    }

    #[test]
    fn channel_input_accepts_camel_case_fields() {
        let input: ChannelDefinitionInput = serde_json::from_str(
            r#"{"active": 2, "type": "ecg", "commonRef": true, "dataGaps": [[3, 5]],
                "filterLen": 10, "trimStart": 10, "trimEnd": 40, "start": -10, "end": 50}"#,
        )
        .unwrap();
        let channel = ChannelDefinition::from(input);
        assert_eq!(channel.kind, SignalKind::Ekg);
        assert!(channel.common_ref);
        assert_eq!(channel.data_gaps, vec![DataGap(3, 5)]);
        assert_eq!(channel.window_len(), 60);
        assert!(channel.filters.is_none());
    }

    #[test]
    fn panics_are_converted_to_failures() {
        let mut bridge = HostBridge::default();
        let result = bridge.guarded::<(), _>(|_| panic!("boom"));
        assert_eq!(
            result.error,
            Some(ErrorDetail::Single("internal error: boom".into()))
        );
    }
}
