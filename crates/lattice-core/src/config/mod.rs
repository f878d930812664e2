//! Configuration for the Lattice engine.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `lattice.toml` file
//! 3. User config `~/.config/lattice/config.toml`
//! 4. Built-in defaults (lowest priority)
//!
//! Every component receives its configuration by value at construction time;
//! there is no ambient mutable state anywhere in the engine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Graph store configuration.
    pub store: StoreConfig,

    /// Retry policy for transient write conflicts.
    pub retry: RetryConfig,

    /// Hybrid search configuration.
    pub search: SearchConfig,

    /// Ingest backpressure configuration.
    pub ingest: IngestConfig,
}

impl EngineConfig {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./lattice.toml` (project local)
    /// 2. `~/.config/lattice/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new("lattice.toml").exists() {
            return Self::from_file("lattice.toml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("lattice").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: EngineConfig = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("LATTICE_DATA_DIR") {
            self.store.data_dir = dir;
        }
        if let Ok(n) = std::env::var("LATTICE_MAX_RETRIES") {
            if let Ok(n) = n.parse() {
                self.retry.max_retries = n;
            }
        }
        if let Ok(ms) = std::env::var("LATTICE_BASE_DELAY_MS") {
            if let Ok(ms) = ms.parse() {
                self.retry.base_delay_ms = ms;
            }
        }
        if let Ok(ms) = std::env::var("LATTICE_DEADLINE_MS") {
            if let Ok(ms) = ms.parse() {
                self.search.overall_deadline_ms = ms;
            }
        }
        if let Ok(ms) = std::env::var("LATTICE_SOURCE_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                self.search.source_timeout_ms = ms;
            }
        }
        if let Ok(n) = std::env::var("LATTICE_MAX_INFLIGHT_BATCHES") {
            if let Ok(n) = n.parse() {
                self.ingest.max_inflight_batches = n;
            }
        }
    }

    /// Reject configurations the engine cannot run with.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.max_inflight_batches == 0 {
            return Err(ConfigError::Invalid(
                "ingest.max_inflight_batches must be at least 1".to_string(),
            ));
        }
        if self.search.overall_deadline_ms == 0 {
            return Err(ConfigError::Invalid(
                "search.overall_deadline_ms must be nonzero".to_string(),
            ));
        }
        for (name, w) in [
            ("vector_weight", self.search.vector_weight),
            ("graph_weight", self.search.graph_weight),
            ("quality_weight", self.search.quality_weight),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(ConfigError::Invalid(format!(
                    "search.{} must be within [0, 1], got {}",
                    name, w
                )));
            }
        }
        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = EngineConfig::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Graph store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the embedded store (default: ".lattice/graph").
    pub data_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
        }
    }
}

impl StoreConfig {
    /// Get the store directory as a path.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

/// Retry policy configuration for transient write conflicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// How many times to retry after the initial attempt.
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,

    /// Multiplier applied to the delay on each subsequent retry.
    pub backoff_multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

/// Hybrid search configuration.
///
/// The weights and the corroboration bonus are deliberately configurable;
/// the defaults are pinned by the merge test fixtures rather than treated
/// as canonical values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Hard deadline for one query across all sources, in milliseconds.
    pub overall_deadline_ms: u64,

    /// Timeout for each individual source call, in milliseconds.
    pub source_timeout_ms: u64,

    /// Merge weight for the vector index source.
    pub vector_weight: f32,

    /// Merge weight for the graph store source.
    pub graph_weight: f32,

    /// Merge weight for the quality scoring source.
    pub quality_weight: f32,

    /// Additive bonus per corroborating source beyond the first.
    pub corroboration_bonus: f32,

    /// Candidates requested from each source before merging.
    pub candidate_pool: usize,

    /// Default number of merged results to return.
    pub result_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            overall_deadline_ms: DEFAULT_OVERALL_DEADLINE_MS,
            source_timeout_ms: DEFAULT_SOURCE_TIMEOUT_MS,
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            graph_weight: DEFAULT_GRAPH_WEIGHT,
            quality_weight: DEFAULT_QUALITY_WEIGHT,
            corroboration_bonus: DEFAULT_CORROBORATION_BONUS,
            candidate_pool: DEFAULT_CANDIDATE_POOL,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

/// Ingest backpressure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum number of document batches in flight at once.
    pub max_inflight_batches: usize,

    /// Target number of items per batch; larger feeds are split.
    pub batch_size: usize,

    /// How many orphan paths a reconcile report quotes verbatim.
    pub sample_limit: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_inflight_batches: DEFAULT_MAX_INFLIGHT_BATCHES,
            batch_size: DEFAULT_BATCH_SIZE,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.store.data_dir, DEFAULT_DATA_DIR);
        assert_eq!(config.retry.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.search.overall_deadline_ms, DEFAULT_OVERALL_DEADLINE_MS);
        assert_eq!(config.ingest.max_inflight_batches, DEFAULT_MAX_INFLIGHT_BATCHES);
    }

    #[test]
    fn test_config_to_toml() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("[search]"));
        assert!(toml_str.contains("[ingest]"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[store]
data_dir = ".custom/graph"

[retry]
max_retries = 5

[search]
overall_deadline_ms = 500
vector_weight = 0.6
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.data_dir, ".custom/graph");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.search.overall_deadline_ms, 500);
        assert_eq!(config.search.vector_weight, 0.6);
        // Untouched sections keep their defaults.
        assert_eq!(config.search.graph_weight, DEFAULT_GRAPH_WEIGHT);
        assert_eq!(config.ingest.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_validate_rejects_bad_weight() {
        let mut config = EngineConfig::default();
        config.search.vector_weight = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_inflight() {
        let mut config = EngineConfig::default();
        config.ingest.max_inflight_batches = 0;
        assert!(config.validate().is_err());
    }
}
