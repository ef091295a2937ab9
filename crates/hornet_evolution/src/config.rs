//! Fuzzer configuration.
//!
//! All tuning knobs with their defaults, overridable from a YAML file at the
//! conventional `config/fuzzer/fuzzer.yaml` location.

use crate::error::Result;
use hornet_entities::GeneratorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Conventional location of the fuzzer configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/fuzzer/fuzzer.yaml";

/// Sentinel disabling the per-request timeout.
pub const INFINITY_TIMEOUT: i64 = -1;

/// Tuning knobs of the evolutionary loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzerConfig {
    /// Seed batches per entity property.
    pub seed_population: usize,
    /// Concurrent batch size; ignored in serial mode.
    pub pool_size: usize,
    /// Numerator of the length score.
    pub string_threshold: usize,
    /// Probability a strictly-worse child is marked killable.
    pub death_chance: f64,
    /// Minimum average movement that counts as progress.
    pub score_eps: f64,
    /// Iterations between stagnation checks.
    pub iterations_threshold: u64,
    /// Maximum queryable rerolls while hunting a mating pair.
    pub selection_threshold: usize,
    /// Minimum filter parts for a crossover parent.
    pub filter_parts_num: usize,
    /// Per-request deadline in seconds; [`INFINITY_TIMEOUT`] disables it.
    pub request_timeout_seconds: i64,
    /// Window during which a transport-failed dispatch is retried.
    pub retry_timeout_seconds: u64,
    /// Master seed for all randomness; entropy when unset.
    pub seed: Option<u64>,
    /// Probabilities passed through to the option generators.
    pub generator: GeneratorConfig,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        Self {
            seed_population: 20,
            pool_size: 20,
            string_threshold: 200,
            death_chance: 0.5,
            score_eps: 200.0,
            iterations_threshold: 30,
            selection_threshold: 10,
            filter_parts_num: 2,
            request_timeout_seconds: 600,
            retry_timeout_seconds: 100,
            seed: None,
            generator: GeneratorConfig::default(),
        }
    }
}

impl FuzzerConfig {
    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&raw)?;
        info!("loaded fuzzer configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Loads the configuration, falling back to defaults when the file does
    /// not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().is_file() {
            Self::load(path)
        } else {
            debug!(
                "no fuzzer configuration at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// The per-request deadline, `None` when disabled by the sentinel.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        u64::try_from(self.request_timeout_seconds)
            .ok()
            .map(Duration::from_secs)
    }
}
