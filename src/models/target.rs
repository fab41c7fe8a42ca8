use serde::Serialize;

/// How a live rollout is tied back to the release being monitored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", content = "key", rename_all = "snake_case")]
pub enum CorrelationStrategy {
    /// `metadata.labels.multiClusterRolloutId` on the live rollout must equal the id.
    RolloutLabel(String),
    /// A release in the history page must carry the id in its commit message.
    ReleaseToken(String),
    /// A release in the history page must have this revision.
    Commit(String),
}

impl CorrelationStrategy {
    pub fn key(&self) -> &str {
        match self {
            Self::RolloutLabel(key) | Self::ReleaseToken(key) | Self::Commit(key) => key,
        }
    }

    /// Whether correlation needs the application's release history.
    pub fn uses_release_history(&self) -> bool {
        !matches!(self, Self::RolloutLabel(_))
    }
}

/// Identifying parameters for one monitoring run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub runtime: String,
    pub application: String,
    pub application_namespace: Option<String>,
    pub rollout: String,
    pub correlation: CorrelationStrategy,
}

impl Target {
    /// The application namespace, falling back to the runtime's namespace.
    pub fn namespace_or<'a>(&'a self, runtime_namespace: &'a str) -> &'a str {
        match self.application_namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => runtime_namespace,
        }
    }

    /// Parameters shown to operators at start-up and on not-found.
    pub fn parameters(&self) -> serde_json::Value {
        let key_name = match self.correlation {
            CorrelationStrategy::Commit(_) => "COMMIT_SHA",
            _ => "MULTI_CLUSTER_ROLLOUT_ID",
        };
        serde_json::json!({
            "RUNTIME": self.runtime,
            "APPLICATION": self.application,
            "ROLLOUT": self.rollout,
            key_name: self.correlation.key(),
        })
    }
}
