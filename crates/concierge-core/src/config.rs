//! Pipeline configuration
//!
//! Loaded from TOML; every section and field has a default, so an empty file
//! is a valid configuration. A few operational knobs can be overridden from
//! the environment after the file is read.

use crate::error::ConfigError;
use crate::gate::GateConfig;
use crate::intent::IntentConfig;
use crate::retry::ProviderConfig;
use concierge_cache::CacheConfig;
use concierge_dedup::DedupConfig;
use concierge_forms::FormConfig;
use concierge_retrieval::{RetrievalConfig, ScopeTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const ENV_MIN_THRESHOLD: &str = "CONCIERGE_MIN_THRESHOLD";
pub const ENV_SYNTHESIS_THRESHOLD: &str = "CONCIERGE_SYNTHESIS_THRESHOLD";
pub const ENV_SYNTHESIS_ENABLED: &str = "CONCIERGE_SYNTHESIS_ENABLED";
pub const ENV_CACHE_TTL_SECS: &str = "CONCIERGE_CACHE_TTL_SECS";

/// Full pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConciergeConfig {
    pub retrieval: RetrievalConfig,
    pub gate: GateConfig,
    pub intent: IntentConfig,
    pub cache: CacheConfig,
    pub dedup: DedupConfig,
    pub forms: FormConfig,
    pub provider: ProviderConfig,
    /// Business scope to audience tags; the built-in table when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<HashMap<String, Vec<String>>>,
}

impl ConciergeConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read, apply environment overrides and validate
    ///
    /// # Errors
    /// `ConfigError` for unreadable files, bad TOML, bad overrides or values
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without overrides or validation
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML or unknown enum values
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Apply the `CONCIERGE_*` overrides found by `lookup`
    ///
    /// # Errors
    /// `ConfigError::Env` when a variable is set but does not parse
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MIN_THRESHOLD) {
            self.gate.min_threshold = parse_env(ENV_MIN_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_SYNTHESIS_THRESHOLD) {
            self.gate.synthesis_threshold = parse_env(ENV_SYNTHESIS_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_SYNTHESIS_ENABLED) {
            self.gate.synthesis_enabled = parse_flag(ENV_SYNTHESIS_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_CACHE_TTL_SECS) {
            self.cache.ttl_secs = parse_env(ENV_CACHE_TTL_SECS, &value)?;
        }
        Ok(())
    }

    /// Check ranges and build the scope table once to reject unknown names
    ///
    /// # Errors
    /// First invalid field
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("gate.min_threshold", self.gate.min_threshold)?;
        unit_interval("gate.synthesis_threshold", self.gate.synthesis_threshold)?;
        if self.gate.synthesis_min_results == 0 {
            return Err(ConfigError::invalid("gate.synthesis_min_results", "must be at least 1"));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::invalid("retrieval.top_k", "must be at least 1"));
        }

        unit_interval("intent.min_keyword_coverage", self.intent.min_keyword_coverage)?;

        let layers = &self.dedup.thresholds;
        unit_interval("dedup.thresholds.semantic", layers.semantic)?;
        unit_interval("dedup.thresholds.phonetic", layers.phonetic)?;
        unit_interval("dedup.thresholds.phonetic_semantic_floor", layers.phonetic_semantic_floor)?;
        if layers.phonetic_semantic_floor >= layers.semantic {
            return Err(ConfigError::invalid(
                "dedup.thresholds.phonetic_semantic_floor",
                "must be below dedup.thresholds.semantic",
            ));
        }
        if self.dedup.scan_limit == 0 {
            return Err(ConfigError::invalid("dedup.scan_limit", "must be at least 1"));
        }

        if self.cache.ttl_secs == 0 || self.cache.max_entries == 0 {
            return Err(ConfigError::invalid("cache", "ttl_secs and max_entries must be positive"));
        }
        if self.provider.timeout_ms == 0 {
            return Err(ConfigError::invalid("provider.timeout_ms", "must be positive"));
        }
        if self.forms.idle_timeout_secs == 0 {
            return Err(ConfigError::invalid("forms.idle_timeout_secs", "must be positive"));
        }

        self.scope_table()?;
        Ok(())
    }

    /// Scope table from `scopes`, or the built-in one
    ///
    /// # Errors
    /// `ConfigError::Scope` for unknown or missing scope names
    pub fn scope_table(&self) -> Result<ScopeTable, ConfigError> {
        match &self.scopes {
            Some(raw) => Ok(ScopeTable::from_config(raw)?),
            None => Ok(ScopeTable::standard()),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_forms(mut self, forms: FormConfig) -> Self {
        self.forms = forms;
        self
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} is outside [0, 1]")))
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_retrieval::DualEmbeddingPolicy;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ConciergeConfig::from_toml_str("").unwrap();
        assert_eq!(config, ConciergeConfig::default());
        assert!((config.gate.min_threshold - 0.6).abs() < f64::EPSILON);
        assert!((config.gate.synthesis_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.gate.synthesis_min_results, 2);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.cache.ttl_secs, 3600);
        config.validate().unwrap();
    }

    #[test]
    fn sections_parse() {
        let raw = r#"
            [retrieval]
            top_k = 5
            dual_policy = "primary_first"

            [gate]
            min_threshold = 0.65
            synthesis_enabled = true

            [scopes]
            external = ["租客", "general"]
            internal = ["管理師"]
        "#;
        let config = ConciergeConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.dual_policy, DualEmbeddingPolicy::PrimaryFirst);
        assert!(config.gate.synthesis_enabled);
        config.validate().unwrap();
    }

    #[test]
    fn unknown_scope_rejected() {
        let raw = r#"
            [scopes]
            external = ["租客"]
            internal = ["管理師"]
            partner = ["x"]
        "#;
        let config = ConciergeConfig::from_toml_str(raw).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Scope(_))));
    }

    #[test]
    fn out_of_range_values_rejected() {
        let mut config = ConciergeConfig::default();
        config.gate.min_threshold = 1.2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "gate.min_threshold", .. })
        ));

        let mut config = ConciergeConfig::default();
        config.gate.synthesis_min_results = 0;
        assert!(config.validate().is_err());

        let mut config = ConciergeConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply_after_file() {
        let mut config = ConciergeConfig::default();
        let env: HashMap<&str, &str> = [
            (ENV_MIN_THRESHOLD, "0.7"),
            (ENV_SYNTHESIS_ENABLED, "on"),
            (ENV_CACHE_TTL_SECS, "120"),
        ]
        .into_iter()
        .collect();
        config
            .apply_env(|var| env.get(var).map(|v| (*v).to_string()))
            .unwrap();
        assert!((config.gate.min_threshold - 0.7).abs() < f64::EPSILON);
        assert!(config.gate.synthesis_enabled);
        assert_eq!(config.cache.ttl_secs, 120);

        let err = config
            .apply_env(|var| (var == ENV_SYNTHESIS_ENABLED).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: ENV_SYNTHESIS_ENABLED, .. }));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gate]\nsynthesis_min_results = 3").unwrap();
        let config = ConciergeConfig::load(file.path()).unwrap();
        assert_eq!(config.gate.synthesis_min_results, 3);

        assert!(matches!(
            ConciergeConfig::load("/nonexistent/concierge.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
