use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{MonitorError, Result};
use crate::models::target::{CorrelationStrategy, Target};

/// Settings loaded from `rollout-monitor.toml`, then overridden by the environment.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct MonitorSettings {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub resource: ResourceConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// Transport-level retries after a failed request.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            retries: default_retries(),
        }
    }
}

fn default_backend_url() -> String {
    "https://g.codefresh.io".to_string()
}

fn default_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PollingConfig {
    /// Seconds between two reads, in both phases.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// How long to wait for the rollout to appear.
    #[serde(default = "default_search_timeout_minutes")]
    pub search_timeout_minutes: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            search_timeout_minutes: default_search_timeout_minutes(),
        }
    }
}

fn default_interval_secs() -> u64 {
    5
}

fn default_search_timeout_minutes() -> u64 {
    20
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HistoryConfig {
    /// Releases fetched per lookup. Older releases are invisible.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResourceConfig {
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_group")]
    pub group: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            version: default_version(),
            group: default_group(),
        }
    }
}

fn default_kind() -> String {
    "Rollout".to_string()
}

fn default_version() -> String {
    "v1alpha1".to_string()
}

fn default_group() -> String {
    "argoproj.io".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExportConfig {
    /// Prefix of every exported variable name.
    #[serde(default = "default_step_name")]
    pub step_name: String,
    /// Export file read back when running as a pipeline plugin.
    #[serde(default = "default_plugin_export_path")]
    pub plugin_export_path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            step_name: default_step_name(),
            plugin_export_path: default_plugin_export_path(),
        }
    }
}

fn default_step_name() -> String {
    "STEP_NAME".to_string()
}

fn default_plugin_export_path() -> PathBuf {
    PathBuf::from("/meta/env_vars_to_export")
}

impl MonitorSettings {
    /// Load settings from a TOML file. Returns defaults if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("settings file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MonitorError::Config(format!("read {}: {e}", path.display())))?;
        let settings: MonitorSettings = toml::from_str(&contents)
            .map_err(|e| MonitorError::Config(format!("parse {}: {e}", path.display())))?;
        tracing::info!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Apply environment overrides on top of the file settings.
    pub fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = non_empty(env, "CF_URL") {
            self.backend.url = url;
        }
        if let Some(step) = non_empty(env, "CF_STEP_NAME") {
            self.export.step_name = step;
        }
        if let Some(n) = parse_positive(env, "RELEASES_TO_RETRIEVE")? {
            self.history.page_size = n as usize;
        }
        if let Some(n) = parse_positive(env, "SEARCH_TIMEOUT")? {
            self.polling.search_timeout_minutes = n;
        }
        if let Some(n) = parse_positive(env, "CHECK_INTERVAL")? {
            self.polling.interval_secs = n;
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    /// Reads allowed in the existence phase: the search timeout divided by the interval.
    pub fn existence_attempts(&self) -> u64 {
        let interval = self.polling.interval_secs.max(1);
        (self.polling.search_timeout_minutes.saturating_mul(60) / interval).max(1)
    }
}

/// Marker and paths present when running inside a CI build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiContext {
    pub build_id: String,
    pub volume_path: Option<PathBuf>,
}

/// Everything one run needs, resolved from file and environment.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub settings: MonitorSettings,
    pub target: Target,
    pub api_key: String,
    pub ci: Option<CiContext>,
}

impl MonitorConfig {
    pub fn from_env(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = env("ROLLOUT_MONITOR_CONFIG").unwrap_or_else(|| "rollout-monitor.toml".to_string());
        let mut settings = MonitorSettings::load(&path)?;
        settings.apply_env(&env)?;

        let target = target_from_env(&env)?;
        let api_key = required(&env, "CF_API_KEY")?;
        let ci = non_empty(&env, "CF_BUILD_ID").map(|build_id| CiContext {
            build_id,
            volume_path: non_empty(&env, "CF_VOLUME_PATH").map(PathBuf::from),
        });

        Ok(Self {
            settings,
            target,
            api_key,
            ci,
        })
    }
}

/// Build the monitoring target. Exactly one correlation key must be given.
pub fn target_from_env(env: &impl Fn(&str) -> Option<String>) -> Result<Target> {
    let runtime = required(env, "RUNTIME")?;
    let application = required(env, "APPLICATION")?;
    let rollout = required(env, "ROLLOUT")?;
    let application_namespace = non_empty(env, "APPLICATION_NAMESPACE");

    let commit = non_empty(env, "COMMIT_SHA");
    let rollout_id = non_empty(env, "MULTI_CLUSTER_ROLLOUT_ID");
    let source = non_empty(env, "CORRELATION_SOURCE").unwrap_or_else(|| "label".to_string());

    let correlation = match (commit, rollout_id) {
        (Some(_), Some(_)) => {
            return Err(MonitorError::Config(
                "COMMIT_SHA and MULTI_CLUSTER_ROLLOUT_ID are mutually exclusive".to_string(),
            ));
        }
        (None, None) => {
            return Err(MonitorError::Config(
                "one of COMMIT_SHA or MULTI_CLUSTER_ROLLOUT_ID is required".to_string(),
            ));
        }
        (Some(sha), None) => {
            if !looks_like_sha(&sha) {
                tracing::warn!("COMMIT_SHA '{sha}' does not look like a git commit sha");
            }
            CorrelationStrategy::Commit(sha)
        }
        (None, Some(id)) => match source.as_str() {
            "label" => CorrelationStrategy::RolloutLabel(id),
            "release-history" => CorrelationStrategy::ReleaseToken(id),
            other => {
                return Err(MonitorError::Config(format!(
                    "CORRELATION_SOURCE must be 'label' or 'release-history', got '{other}'"
                )));
            }
        },
    };

    Ok(Target {
        runtime,
        application,
        application_namespace,
        rollout,
        correlation,
    })
}

fn looks_like_sha(value: &str) -> bool {
    regex::Regex::new(r"^[0-9a-fA-F]{7,40}$")
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

fn non_empty(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    non_empty(env, key).ok_or_else(|| MonitorError::Config(format!("{key} is required")))
}

fn parse_positive(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = non_empty(env, key) else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(MonitorError::Config(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
    }
}
