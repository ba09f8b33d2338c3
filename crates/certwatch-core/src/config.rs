//! Harness configuration.
//!
//! Built-in defaults cover the watched environments. A JSON file can replace
//! any part of them, and environment variables override individual values:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `<NAME>_URL` (e.g. `DEMO_URL`) | base URL of environment `NAME` |
//! | `CERTWATCH_REPORT_DIR` | artifact directory |
//! | `CERTWATCH_POLL_DEADLINE_SECS` | poll deadline |
//! | `CERTWATCH_POLL_INTERVAL_MS` | poll sampling interval |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregator::EnvironmentTarget;
use crate::error::ConfigError;
use crate::poller::PollConfig;
use crate::registry::{builtin_environments, find_environment, EnvironmentSpec};

pub const REPORT_DIR_ENV: &str = "CERTWATCH_REPORT_DIR";
pub const POLL_DEADLINE_ENV: &str = "CERTWATCH_POLL_DEADLINE_SECS";
pub const POLL_INTERVAL_ENV: &str = "CERTWATCH_POLL_INTERVAL_MS";

/// Poll timing as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSettings {
    pub deadline_secs: u64,
    pub interval_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            deadline_secs: 30,
            interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarnessConfig {
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default = "builtin_environments")]
    pub environments: Vec<EnvironmentSpec>,
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("report")
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            report_dir: default_report_dir(),
            poll: PollSettings::default(),
            environments: builtin_environments(),
        }
    }
}

impl HarnessConfig {
    /// Load a JSON config file; omitted sections fall back to the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read(path).map_err(|source| ConfigError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides resolved through `lookup` (the process environment in production).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for env in &mut self.environments {
            if let Some(url) = lookup(&format!("{}_URL", env.name.to_ascii_uppercase())) {
                env.base_url = url;
            }
        }
        if let Some(dir) = lookup(REPORT_DIR_ENV) {
            self.report_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(POLL_DEADLINE_ENV) {
            self.poll.deadline_secs = parse_u64(POLL_DEADLINE_ENV, &raw)?;
        }
        if let Some(raw) = lookup(POLL_INTERVAL_ENV) {
            self.poll.interval_ms = parse_u64(POLL_INTERVAL_ENV, &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poll.intervalMs".to_string(),
                value: "0".to_string(),
            });
        }
        for (idx, env) in self.environments.iter().enumerate() {
            if env.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("environments[{idx}].name"),
                    value: env.name.clone(),
                });
            }
            let dup = self.environments[..idx]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&env.name));
            if dup {
                return Err(ConfigError::InvalidValue {
                    key: "environments".to_string(),
                    value: format!("duplicate environment {}", env.name),
                });
            }
        }
        Ok(())
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(self.poll.deadline_secs),
            Duration::from_millis(self.poll.interval_ms),
        )
    }

    pub fn environment(&self, name: &str) -> Result<&EnvironmentSpec, ConfigError> {
        find_environment(&self.environments, name)
            .ok_or_else(|| ConfigError::UnknownEnvironment(name.to_string()))
    }

    /// Resolve `names` in the given order; an empty list selects every environment.
    pub fn select(&self, names: &[String]) -> Result<Vec<&EnvironmentSpec>, ConfigError> {
        if names.is_empty() {
            return Ok(self.environments.iter().collect());
        }
        names.iter().map(|n| self.environment(n)).collect()
    }

    /// Artifact locations of every configured environment, in configuration order.
    pub fn targets(&self) -> Vec<EnvironmentTarget> {
        self.environments
            .iter()
            .map(|env| EnvironmentTarget::from_spec(env, &self.report_dir))
            .collect()
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = HarnessConfig::default();
        assert_eq!(cfg.report_dir, PathBuf::from("report"));
        assert_eq!(cfg.poll_config().deadline, Duration::from_secs(30));
        assert_eq!(cfg.environments.len(), 3);
    }

    #[test]
    fn test_env_overrides_apply() {
        let cfg = HarnessConfig::default()
            .with_overrides(lookup(&[
                ("ETRAINING_URL", "https://etraining45512.certified.io"),
                ("CERTWATCH_REPORT_DIR", "/tmp/cw"),
                ("CERTWATCH_POLL_DEADLINE_SECS", "180"),
                ("CERTWATCH_POLL_INTERVAL_MS", "2000"),
            ]))
            .expect("overrides");
        assert_eq!(
            cfg.environment("etraining").unwrap().base_url,
            "https://etraining45512.certified.io"
        );
        assert_eq!(cfg.report_dir, PathBuf::from("/tmp/cw"));
        assert_eq!(cfg.poll_config().deadline, Duration::from_secs(180));
        assert_eq!(cfg.poll_config().interval, Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = HarnessConfig::default()
            .with_overrides(lookup(&[("CERTWATCH_POLL_DEADLINE_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let err = HarnessConfig::default()
            .with_overrides(lookup(&[("CERTWATCH_POLL_INTERVAL_MS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("intervalMs"));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("certwatch.json");
        std::fs::write(
            &path,
            r#"{ "environments": [ { "name": "STAGING", "baseUrl": "https://staging.certified.io",
                 "expected": [ { "title": "Cert A", "subtitle": "Online" } ] } ] }"#,
        )
        .expect("write");

        let cfg = HarnessConfig::load(&path).expect("load");
        assert_eq!(cfg.report_dir, PathBuf::from("report"));
        assert_eq!(cfg.environments.len(), 1);
        let staging = cfg.environment("staging").expect("staging");
        assert!(staging.select_first);
        assert_eq!(staging.expected[0].subtitle.as_deref(), Some("Online"));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut cfg = HarnessConfig::default();
        let dup = cfg.environments[0].clone();
        cfg.environments.push(dup);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_select_preserves_requested_order() {
        let cfg = HarnessConfig::default();
        let picked = cfg
            .select(&["etraining".to_string(), "demo".to_string()])
            .expect("select");
        let names: Vec<&str> = picked.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["ETRAINING", "DEMO"]);
        assert!(cfg.select(&["nope".to_string()]).is_err());
    }
}
