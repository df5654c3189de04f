use anyhow::Context;
use montagecore::config::EngineConfig;
use montagecore::filters::defaults::FilterSetting;
use montagecore::host::ChannelDefinitionInput;
use montagecore::montage::channel::{DataGap, SignalKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Sinusoid added to one recorded channel.
#[derive(Clone, Debug, Deserialize)]
pub struct ToneConfig {
    pub channel: usize,
    pub frequency: f64,
    #[serde(default = "unit_amplitude")]
    pub amplitude: f32,
}

fn unit_amplitude() -> f32 {
    1.0
}

/// Synthetic multichannel recording played into the raw buffers.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub channels: usize,
    pub sampling_rate: f64,
    pub duration_secs: f64,
    pub seed: u64,
    pub noise: f32,
    /// Mains interference added to every channel.
    pub line_frequency: Option<f64>,
    pub line_amplitude: f32,
    pub tones: Vec<ToneConfig>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            sampling_rate: 256.0,
            duration_secs: 8.0,
            seed: 0,
            noise: 0.05,
            line_frequency: Some(50.0),
            line_amplitude: 0.3,
            tones: vec![
                ToneConfig {
                    channel: 0,
                    frequency: 10.0,
                    amplitude: 1.0,
                },
                ToneConfig {
                    channel: 2,
                    frequency: 6.0,
                    amplitude: 0.5,
                },
            ],
        }
    }
}

impl RecordingConfig {
    pub fn total_samples(&self) -> usize {
        (self.duration_secs * self.sampling_rate).round().max(0.0) as usize
    }
}

/// Requested window in seconds; gaps are sample ranges relative to its start.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub start_secs: f64,
    pub end_secs: f64,
    pub gaps: Vec<DataGap>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start_secs: 2.0,
            end_secs: 6.0,
            gaps: Vec::new(),
        }
    }
}

impl WindowConfig {
    pub fn to_samples(&self, sampling_rate: f64) -> (i64, i64) {
        (
            (self.start_secs * sampling_rate).round() as i64,
            (self.end_secs * sampling_rate).round() as i64,
        )
    }
}

/// Pacing of the live producer.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Samples published per channel on every tick.
    pub chunk: usize,
    pub tick_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            chunk: 64,
            tick_ms: 5,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub recording: RecordingConfig,
    pub engine: EngineConfig,
    pub montages: BTreeMap<String, Vec<ChannelDefinitionInput>>,
    pub active_montage: String,
    pub window: WindowConfig,
    /// Montage channels to derive; empty derives all of them.
    pub selection: Vec<usize>,
    pub live: LiveConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let channel = |active: usize, reference: Vec<usize>| ChannelDefinitionInput {
            active,
            reference,
            common_ref: false,
            kind: SignalKind::Eeg,
            filters: None,
            start: 0,
            end: 0,
            filter_len: 0,
            data_gaps: Vec::new(),
            trim_start: 0,
            trim_end: 0,
        };
        let mut montages = BTreeMap::new();
        montages.insert(
            "bipolar".to_string(),
            vec![
                channel(0, vec![1]),
                channel(1, vec![2]),
                channel(2, vec![3]),
            ],
        );
        montages.insert(
            "average".to_string(),
            (0..4)
                .map(|active| ChannelDefinitionInput {
                    common_ref: true,
                    ..channel(active, vec![0, 1, 2, 3])
                })
                .collect(),
        );

        let mut engine = EngineConfig::default();
        engine.filters.highpass = Some(FilterSetting::new(0.5, None));
        engine.filters.lowpass = Some(FilterSetting::new(40.0, None));
        engine.filters.notch = Some(FilterSetting::new(50.0, None));
        engine.filters.padding_secs = 1.0;

        Self {
            recording: RecordingConfig::default(),
            engine,
            montages,
            active_montage: "bipolar".to_string(),
            window: WindowConfig::default(),
            selection: Vec::new(),
            live: LiveConfig::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Number of outputs a run needs.
    pub fn output_count(&self) -> usize {
        if !self.selection.is_empty() {
            return self.selection.len();
        }
        self.montages
            .get(&self.active_montage)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montagecore::config::CacheScope;
    use montagecore::filters::defaults::FilterKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_workflow_is_self_consistent() {
        let cfg = WorkflowConfig::default();
        assert!(cfg.montages.contains_key(&cfg.active_montage));
        assert_eq!(cfg.output_count(), 3);
        assert_eq!(cfg.recording.total_samples(), 2048);
        assert_eq!(cfg.window.to_samples(256.0), (512, 1536));
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            br#"recording:
  channels: 2
  sampling_rate: 128
  duration_secs: 4
  tones:
    - { channel: 0, frequency: 8 }
engine:
  filters:
    lowpass: { Wn: 30, N: 4 }
    padding_secs: 0.5
  cache_scope: session
montages:
  ref:
    - { active: 0, reference: [1], type: eeg, filters: { lowpass: null } }
active_montage: ref
window: { start_secs: 1, end_secs: 3, gaps: [[10, 20]] }
selection: [0]
"#,
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.recording.channels, 2);
        assert_eq!(cfg.recording.tones[0].amplitude, 1.0);
        assert_eq!(cfg.engine.cache_scope, CacheScope::Session);
        assert_eq!(
            cfg.engine.filters.get(FilterKind::Lowpass),
            Some(FilterSetting::new(30.0, Some(4)))
        );
        assert_eq!(cfg.window.gaps, vec![DataGap(10, 20)]);
        assert_eq!(cfg.montages["ref"][0].reference, vec![1]);
        assert_eq!(cfg.output_count(), 1);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = WorkflowConfig::load("/nonexistent/workflow.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/workflow.yaml"));
    }
}
