use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_EDGE_INSERTION_TOPIC: &str = "edge_insertion";
pub const DEFAULT_DATA_PROCESSING_TOPIC: &str = "data_processing";

/// Runtime knobs for the engine, workers and CLI. Defaults suit a local
/// SQLite database; every field can be set from a TOML file and then
/// overridden with `GRAPHWEAVE_<FIELD>` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database_url: String,
    /// Topic carrying `EdgeQueueItem` messages.
    pub edge_insertion_topic: String,
    /// Topic carrying data source ids to process.
    pub data_processing_topic: String,
    /// Seconds of delay per failed attempt before an edge is retried.
    pub edge_insertion_backoff_multiplier: u64,
    pub edge_insertion_max_retries: u32,
    /// Lifetime of the `edge_insertion_<id>` dedup key.
    pub edge_dedup_ttl_secs: u64,
    /// Data sources processed in parallel.
    pub processing_concurrency: usize,
    pub link_batch_size: u64,
    pub queue_poll_interval_ms: u64,
    /// Period of the batch linking pass.
    pub link_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://graphweave.db?mode=rwc".to_string(),
            edge_insertion_topic: DEFAULT_EDGE_INSERTION_TOPIC.to_string(),
            data_processing_topic: DEFAULT_DATA_PROCESSING_TOPIC.to_string(),
            edge_insertion_backoff_multiplier: 5,
            edge_insertion_max_retries: 10,
            edge_dedup_ttl_secs: 3_600,
            processing_concurrency: 4,
            link_batch_size: 500,
            queue_poll_interval_ms: 1_000,
            link_interval_secs: 60,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid engine configuration")
    }

    /// Reads `path` (when given) and applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies `GRAPHWEAVE_*` overrides read through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(name: &str, raw: String) -> Result<T>
        where
            T::Err: std::fmt::Display,
        {
            raw.trim()
                .parse::<T>()
                .map_err(|err| anyhow::anyhow!("invalid value for {}: {}", name, err))
        }

        if let Some(v) = lookup("GRAPHWEAVE_DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = lookup("GRAPHWEAVE_EDGE_INSERTION_TOPIC") {
            self.edge_insertion_topic = v;
        }
        if let Some(v) = lookup("GRAPHWEAVE_DATA_PROCESSING_TOPIC") {
            self.data_processing_topic = v;
        }
        if let Some(v) = lookup("GRAPHWEAVE_EDGE_INSERTION_BACKOFF_MULTIPLIER") {
            self.edge_insertion_backoff_multiplier =
                parse("GRAPHWEAVE_EDGE_INSERTION_BACKOFF_MULTIPLIER", v)?;
        }
        if let Some(v) = lookup("GRAPHWEAVE_EDGE_INSERTION_MAX_RETRIES") {
            self.edge_insertion_max_retries = parse("GRAPHWEAVE_EDGE_INSERTION_MAX_RETRIES", v)?;
        }
        if let Some(v) = lookup("GRAPHWEAVE_EDGE_DEDUP_TTL_SECS") {
            self.edge_dedup_ttl_secs = parse("GRAPHWEAVE_EDGE_DEDUP_TTL_SECS", v)?;
        }
        if let Some(v) = lookup("GRAPHWEAVE_PROCESSING_CONCURRENCY") {
            self.processing_concurrency = parse("GRAPHWEAVE_PROCESSING_CONCURRENCY", v)?;
        }
        if let Some(v) = lookup("GRAPHWEAVE_LINK_BATCH_SIZE") {
            self.link_batch_size = parse("GRAPHWEAVE_LINK_BATCH_SIZE", v)?;
        }
        if let Some(v) = lookup("GRAPHWEAVE_QUEUE_POLL_INTERVAL_MS") {
            self.queue_poll_interval_ms = parse("GRAPHWEAVE_QUEUE_POLL_INTERVAL_MS", v)?;
        }
        if let Some(v) = lookup("GRAPHWEAVE_LINK_INTERVAL_SECS") {
            self.link_interval_secs = parse("GRAPHWEAVE_LINK_INTERVAL_SECS", v)?;
        }

        Ok(self)
    }

    pub fn backoff_multiplier(&self) -> Duration {
        Duration::from_secs(self.edge_insertion_backoff_multiplier)
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.edge_dedup_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    pub fn link_interval(&self) -> Duration {
        Duration::from_secs(self.link_interval_secs)
    }

    /// At least one task, whatever was configured.
    pub fn concurrency(&self) -> usize {
        self.processing_concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            database_url = "sqlite::memory:"
            edge_insertion_max_retries = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.edge_insertion_max_retries, 3);
        assert_eq!(config.edge_insertion_topic, DEFAULT_EDGE_INSERTION_TOPIC);
        assert_eq!(config.processing_concurrency, 4);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GRAPHWEAVE_EDGE_INSERTION_BACKOFF_MULTIPLIER", "2"),
            ("GRAPHWEAVE_PROCESSING_CONCURRENCY", "0"),
            ("GRAPHWEAVE_EDGE_INSERTION_TOPIC", "edges"),
        ]);
        let config = EngineConfig::default()
            .with_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backoff_multiplier(), Duration::from_secs(2));
        assert_eq!(config.edge_insertion_topic, "edges");
        assert_eq!(config.concurrency(), 1);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let result = EngineConfig::default().with_overrides(|name| {
            (name == "GRAPHWEAVE_LINK_BATCH_SIZE").then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }
}
