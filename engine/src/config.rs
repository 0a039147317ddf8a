use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Tunables for one run. Fixed for the lifetime of a [`crate::Model`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfConfig {
    /// Neighbors kept per user.
    pub k_neighbors: usize,
    /// Co-rated items required before a correlation counts.
    pub min_overlap: usize,
    /// Length cap for prediction and popularity lists.
    pub top_n: usize,
    /// Worker threads per phase.
    pub workers: usize,
    /// Users with fewer ratings than this get the popularity fallback.
    pub cold_threshold: usize,
}

impl Default for CfConfig {
    fn default() -> Self {
        Self { k_neighbors: 20, min_overlap: 5, top_n: 500, workers: 16, cold_threshold: 10 }
    }
}

impl CfConfig {
    /// Load a JSON file; missing keys keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let cfg: CfConfig = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.k_neighbors > 0, "k_neighbors must be at least 1");
        ensure!(self.top_n > 0, "top_n must be at least 1");
        ensure!(self.workers > 0, "workers must be at least 1");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_run() {
        let c = CfConfig::default();
        assert_eq!(c.k_neighbors, 20);
        assert_eq!(c.min_overlap, 5);
        assert_eq!(c.top_n, 500);
        assert_eq!(c.workers, 16);
        assert_eq!(c.cold_threshold, 10);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c: CfConfig = serde_json::from_str(r#"{ "k_neighbors": 7, "workers": 2 }"#).unwrap();
        assert_eq!(c.k_neighbors, 7);
        assert_eq!(c.workers, 2);
        assert_eq!(c.top_n, 500);
    }

    #[test]
    fn zero_workers_rejected() {
        let c = CfConfig { workers: 0, ..CfConfig::default() };
        assert!(c.validate().is_err());
    }
}
