//! CrawlerConfig - 実行時設定
//!
//! JSON から読み込み、起動前に `validate` で検証します（Fail-fast）。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{ABORT_PRIORITY, CrawlerError, DEFAULT_PRIORITY, STOP_PRIORITY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlerConfig {
    /// Worker threads used by `Crawler::run_default`.
    pub workers: usize,
    /// Priority of bare targets returned by routines.
    pub default_priority: i64,
    /// Priority of bare targets produced by the seeder.
    pub seed_priority: i64,
    /// Worker thread name prefix; the worker index is appended.
    pub thread_name: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            default_priority: DEFAULT_PRIORITY,
            seed_priority: -1,
            thread_name: "trawler-worker".to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn from_json_str(s: &str) -> Result<Self, CrawlerError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CrawlerError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CrawlerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Worker count at least 1; default and seed priorities strictly between
    /// the sentinel priorities, so sentinels keep their place in the queue.
    pub fn validate(&self) -> Result<(), CrawlerError> {
        if self.workers == 0 {
            return Err(CrawlerError::InvalidWorkerCount);
        }
        for (name, value) in [
            ("default_priority", self.default_priority),
            ("seed_priority", self.seed_priority),
        ] {
            if value <= STOP_PRIORITY || value >= ABORT_PRIORITY {
                return Err(CrawlerError::InvalidConfig(format!(
                    "{name} must lie strictly between the sentinel priorities, got {value}"
                )));
            }
        }
        if self.thread_name.trim().is_empty() {
            return Err(CrawlerError::InvalidConfig(
                "thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = CrawlerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CrawlerConfig::default());
        assert_eq!(config.seed_priority, -1);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn fields_override_defaults() {
        let config =
            CrawlerConfig::from_json_str(r#"{"workers": 8, "thread_name": "crawl"}"#).unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.thread_name, "crawl");
        assert_eq!(config.default_priority, 0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = CrawlerConfig::from_json_str(r#"{"wokers": 2}"#).unwrap_err();
        assert!(matches!(err, CrawlerError::ConfigParse(_)));
    }

    #[rstest]
    #[case(r#"{"workers": 0}"#)]
    #[case(r#"{"seed_priority": -9223372036854775808}"#)]
    #[case(r#"{"default_priority": 9223372036854775807}"#)]
    #[case(r#"{"thread_name": "  "}"#)]
    fn invalid_values_fail_validation(#[case] raw: &str) {
        let err = CrawlerConfig::from_json_str(raw).unwrap_err();
        assert!(matches!(
            err,
            CrawlerError::InvalidWorkerCount | CrawlerError::InvalidConfig(_)
        ));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = CrawlerConfig::from_json_file("/nonexistent/trawler.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/trawler.json"));
    }
}
