//! Configuration for fusion deduplication.
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! defaults below, so `{}` is a valid configuration.

use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;

use crate::error::{FusionError, Result};

/// Thresholds controlling when two fusion calls are treated as the same event
#[derive(Deserialize, Debug, Clone)]
pub struct MergeThresholds {
    /// Similarity ratio that must be strictly exceeded to merge two calls
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    /// Only compare calls reporting the same (KnownGene1, KnownGene2) pair
    #[serde(default = "default_require_gene_match")]
    pub require_gene_match: bool,
    /// Score chromosome-pair partitions on the rayon thread pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_min_similarity() -> f64 { 0.8 }
fn default_require_gene_match() -> bool { true }
fn default_parallel() -> bool { true }

impl Default for MergeThresholds {
    fn default() -> Self {
        Self {
            min_similarity: default_min_similarity(),
            require_gene_match: default_require_gene_match(),
            parallel: default_parallel(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ThresholdConfig {
    #[serde(default)]
    pub merge: MergeThresholds,
}

/// Top-level configuration
#[derive(Deserialize, Debug, Clone, Default)]
pub struct MergeConfig {
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

impl MergeConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> Result<Self> {
        let file = File::open(path).map_err(|e| FusionError::Config {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        let reader = BufReader::new(file);
        let config: MergeConfig = serde_json::from_reader(reader).map_err(|e| FusionError::Config {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    /// Replace the similarity threshold (e.g. from the command line).
    pub fn with_min_similarity(mut self, min_similarity: f64) -> Result<Self> {
        self.thresholds.merge.min_similarity = min_similarity;
        self.validate("<command line>")?;
        Ok(self)
    }

    pub fn min_similarity(&self) -> f64 {
        self.thresholds.merge.min_similarity
    }

    fn validate(&self, path: &str) -> Result<()> {
        let t = self.thresholds.merge.min_similarity;
        if !(0.0..=1.0).contains(&t) {
            return Err(FusionError::Config {
                path: path.to_string(),
                message: format!("min_similarity must be within [0, 1], got {}", t),
            });
        }
        Ok(())
    }
}
