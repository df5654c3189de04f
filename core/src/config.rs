use serde::{Deserialize, Serialize};

use crate::filters::defaults::DefaultFilters;
use crate::prelude::{DerivationError, DerivationResult};

/// Lifetime of designed filter coefficients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// Discarded at the end of every `compute_signals` call.
    #[default]
    Call,
    /// Kept for the life of the engine.
    Session,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub filters: DefaultFilters,
    pub cache_scope: CacheScope,
}

impl EngineConfig {
    pub fn from_json(text: &str) -> DerivationResult<Self> {
        serde_json::from_str(text)
            .map_err(|err| DerivationError::Configuration(format!("invalid engine config: {}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::defaults::FilterKind;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.cache_scope, CacheScope::Call);
    }

    #[test]
    fn parses_filters_and_scope() {
        let config = EngineConfig::from_json(
            r#"{"filters": {"highpass": {"wn": 0.5}, "notch": {"wn": 50.0, "order": 4}, "padding_secs": 2.0},
                "cache_scope": "session"}"#,
        )
        .unwrap();
        assert_eq!(config.cache_scope, CacheScope::Session);
        assert_eq!(config.filters.get(FilterKind::Highpass).unwrap().wn, 0.5);
        assert_eq!(config.filters.get(FilterKind::Notch).unwrap().order, Some(4));
        assert!(config.filters.get(FilterKind::Lowpass).is_none());
        assert_eq!(config.filters.padding_samples(100.0), 200);
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        assert!(matches!(
            EngineConfig::from_json("{\"cache_scope\": \"forever\"}"),
            Err(DerivationError::Configuration(_))
        ));
    }
}
