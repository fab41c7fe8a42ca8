use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Label (and commit-message key) carrying the multi-cluster rollout id.
pub const CORRELATION_LABEL: &str = "multiClusterRolloutId";

/// Annotation holding the rollout's current revision number.
pub const REVISION_ANNOTATION: &str = "rollout.argoproj.io/revision";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutPhase {
    Healthy,
    Progressing,
    Paused,
    Degraded,
    Terminated,
    Unknown,
}

/// What the poll loop does with a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseClass {
    Continue,
    Success,
    Failure,
}

impl RolloutPhase {
    /// Case-insensitive; anything unrecognised is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "healthy" => Self::Healthy,
            "progressing" => Self::Progressing,
            "paused" => Self::Paused,
            "degraded" => Self::Degraded,
            "terminated" => Self::Terminated,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Progressing => "progressing",
            Self::Paused => "paused",
            Self::Degraded => "degraded",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        }
    }

    /// Progressing and Paused keep polling; Healthy succeeds; everything else fails.
    pub fn classify(self) -> PhaseClass {
        match self {
            Self::Progressing | Self::Paused => PhaseClass::Continue,
            Self::Healthy => PhaseClass::Success,
            Self::Degraded | Self::Terminated | Self::Unknown => PhaseClass::Failure,
        }
    }
}

impl fmt::Display for RolloutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized live status of a correlated rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutState {
    pub name: String,
    pub namespace: String,
    pub resource_version: String,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    /// Value of the revision annotation, empty when absent.
    pub revision: String,
    pub phase: RolloutPhase,
    pub ready_replicas: i32,
    pub replicas: i32,
}

/// Result of one read: a correlated rollout, or nothing (yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutLookup {
    NotFound,
    Found(RolloutState),
}

impl RolloutLookup {
    pub fn found(self) -> Option<RolloutState> {
        match self {
            Self::Found(state) => Some(state),
            Self::NotFound => None,
        }
    }
}

// ── Live-state manifest ──

#[derive(Debug, Deserialize)]
pub struct LiveRollout {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: LiveStatus,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub phase: Option<String>,
    pub ready_replicas: Option<i32>,
    pub replicas: Option<i32>,
}

impl LiveRollout {
    /// Parse the `liveState` string. An empty string means the resource is absent.
    pub fn parse(live_state: &str) -> Result<Option<Self>, serde_json::Error> {
        if live_state.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(live_state).map(Some)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    pub fn into_state(self) -> RolloutState {
        let meta = self.metadata;
        let revision = meta
            .annotations
            .as_ref()
            .and_then(|a| a.get(REVISION_ANNOTATION))
            .cloned()
            .unwrap_or_default();
        RolloutState {
            name: meta.name.unwrap_or_default(),
            namespace: meta.namespace.unwrap_or_default(),
            resource_version: meta.resource_version.unwrap_or_default(),
            uid: meta.uid.unwrap_or_default(),
            labels: meta.labels.unwrap_or_default(),
            revision,
            phase: self
                .status
                .phase
                .as_deref()
                .map(RolloutPhase::parse)
                .unwrap_or(RolloutPhase::Unknown),
            ready_replicas: self.status.ready_replicas.unwrap_or(0),
            replicas: self.status.replicas.unwrap_or(0),
        }
    }
}
