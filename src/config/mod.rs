//! Configuration loading and management.
//!
//! Loads tracker configuration from `./taintflow.toml` (or
//! `$TAINTFLOW_CONFIG_PATH`). Environment variables override file values;
//! file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

pub mod targets;

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::Target;

/// Top-level tracker configuration loaded from TOML.
///
/// Path: `./taintflow.toml` or `$TAINTFLOW_CONFIG_PATH`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaintflowConfig {
    /// Core tracker settings (`[tracker]`).
    pub tracker: TrackerConfig,
    /// Source/sink catalog inputs (`[targets]`).
    pub targets: TargetsConfig,
    /// Single-flow shortcut (`[flow]`), an alternative to targets files.
    pub flow: FlowConfig,
}

impl TaintflowConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from the TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: TaintflowConfig =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(TaintflowConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve the config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(p) = env("TAINTFLOW_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("taintflow.toml")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("TAINTFLOW_LOG_LEVEL") {
            self.tracker.log_level = v;
        }
        if let Some(v) = env("TAINTFLOW_SOURCES") {
            self.targets.sources_file = Some(v);
        }
        if let Some(v) = env("TAINTFLOW_SINKS") {
            self.targets.sinks_file = Some(v);
        }
    }

    /// Parse a TOML string into config (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: TaintflowConfig =
            toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Resolves the source and sink catalogs this configuration names.
    ///
    /// The single-flow shortcut, when set, takes precedence over targets
    /// files and yields one-element catalogs.
    pub fn resolve_targets(&self) -> (Vec<Target>, Vec<Target>) {
        if self.flow.is_set() {
            return self.flow.as_catalogs();
        }

        let sources = self
            .targets
            .sources_file
            .as_deref()
            .map(targets::parse_targets_file)
            .unwrap_or_default();
        let sinks = self
            .targets
            .sinks_file
            .as_deref()
            .map(targets::parse_targets_file)
            .unwrap_or_default();
        (sources, sinks)
    }
}

// ── Tracker config ──────────────────────────────────────────────

/// Core tracker settings (`[tracker]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Tracing log level filter (`trace` enables per-byte detail).
    pub log_level: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// ── Targets config ──────────────────────────────────────────────

/// Paths to the delimited-text catalog files (`[targets]`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    /// Sources list file.
    pub sources_file: Option<String>,
    /// Sinks list file.
    pub sinks_file: Option<String>,
}

// ── Flow config ─────────────────────────────────────────────────

/// Single-flow shortcut (`[flow]`): name one network source and one network
/// sink directly, without targets files.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Source peer address.
    pub source_address: Option<String>,
    /// Source peer port.
    pub source_port: Option<u16>,
    /// Sink peer address.
    pub sink_address: Option<String>,
    /// Sink peer port.
    pub sink_port: Option<u16>,
}

impl FlowConfig {
    /// Whether any shortcut field is present.
    pub fn is_set(&self) -> bool {
        self.source_address.is_some() || self.sink_address.is_some()
    }

    /// Expands the shortcut into one-element catalogs.
    pub fn as_catalogs(&self) -> (Vec<Target>, Vec<Target>) {
        let sources = match (&self.source_address, self.source_port) {
            (Some(address), Some(port)) => vec![Target::network(address.clone(), port)],
            _ => Vec::new(),
        };
        let sinks = match (&self.sink_address, self.sink_port) {
            (Some(address), Some(port)) => vec![Target::network(address.clone(), port)],
            _ => Vec::new(),
        };
        (sources, sinks)
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TaintflowConfig::default();
        assert_eq!(config.tracker.log_level, "info");
        assert!(config.targets.sources_file.is_none());
        assert!(config.targets.sinks_file.is_none());
        assert!(!config.flow.is_set());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[tracker]
log_level = "debug"

[targets]
sources_file = "/etc/taintflow/sources"
sinks_file = "/etc/taintflow/sinks"
"#;
        let config = TaintflowConfig::from_toml(toml_str).expect("should parse");
        assert_eq!(config.tracker.log_level, "debug");
        assert_eq!(
            config.targets.sources_file.as_deref(),
            Some("/etc/taintflow/sources")
        );
        assert_eq!(
            config.targets.sinks_file.as_deref(),
            Some("/etc/taintflow/sinks")
        );
    }

    #[test]
    fn test_parse_partial_toml_uses_defaults() {
        let config = TaintflowConfig::from_toml("[tracker]\nlog_level = \"warn\"\n")
            .expect("should parse");
        assert_eq!(config.tracker.log_level, "warn");
        assert!(config.targets.sources_file.is_none());
    }

    #[test]
    fn test_env_overrides_config_values() {
        let mut config = TaintflowConfig::from_toml(
            "[targets]\nsources_file = \"/from/toml/sources\"\n",
        )
        .expect("should parse");

        let env = |key: &str| -> Option<String> {
            match key {
                "TAINTFLOW_SOURCES" => Some("/from/env/sources".to_string()),
                "TAINTFLOW_LOG_LEVEL" => Some("trace".to_string()),
                _ => None,
            }
        };
        config.apply_overrides(env);

        assert_eq!(
            config.targets.sources_file.as_deref(),
            Some("/from/env/sources")
        );
        assert_eq!(config.tracker.log_level, "trace");
        // No override: file value kept.
        assert!(config.targets.sinks_file.is_none());
    }

    #[test]
    fn test_config_path_uses_env_var() {
        let path = TaintflowConfig::config_path_with(|key| match key {
            "TAINTFLOW_CONFIG_PATH" => Some("/custom/taintflow.toml".to_string()),
            _ => None,
        });
        assert_eq!(path, PathBuf::from("/custom/taintflow.toml"));

        let default = TaintflowConfig::config_path_with(|_| None);
        assert_eq!(default, PathBuf::from("taintflow.toml"));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        assert!(TaintflowConfig::from_toml("this is {{ not valid toml").is_err());
    }

    #[test]
    fn test_flow_shortcut_builds_single_entry_catalogs() {
        let config = TaintflowConfig::from_toml(
            r#"
[flow]
source_address = "1.2.3.4"
source_port = 80
sink_address = "5.6.7.8"
sink_port = 443
"#,
        )
        .expect("should parse");

        assert!(config.flow.is_set());
        let (sources, sinks) = config.resolve_targets();
        assert_eq!(sources, vec![Target::network("1.2.3.4", 80)]);
        assert_eq!(sinks, vec![Target::network("5.6.7.8", 443)]);
    }

    #[test]
    fn test_flow_shortcut_takes_precedence_over_files() {
        let config = TaintflowConfig::from_toml(
            r#"
[targets]
sources_file = "/ignored"

[flow]
source_address = "9.9.9.9"
source_port = 53
"#,
        )
        .expect("should parse");

        let (sources, sinks) = config.resolve_targets();
        assert_eq!(sources, vec![Target::network("9.9.9.9", 53)]);
        assert!(sinks.is_empty());
    }
}
