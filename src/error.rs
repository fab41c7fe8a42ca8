use crate::models::rollout::RolloutPhase;

/// Failures talking to the backend, after transport-level retries.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("graphql query {query} failed: {}", messages.join("; "))]
    GraphQl {
        query: &'static str,
        messages: Vec<String>,
    },
    #[error("unexpected response from {what}: {reason}")]
    Decode { what: &'static str, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("release {revision} has no multiClusterRolloutId line in its commit message")]
    CorrelationTokenMissing { revision: String },

    #[error(
        "App, Release or Rollout not found after {attempts} attempts. \
         It doesn't exist or it's too old (not in the last {horizon} releases of the application)"
    )]
    TargetNotFound { attempts: u64, horizon: usize },

    #[error("rollout status: {phase}")]
    RolloutFailed { phase: RolloutPhase },

    #[error("live state is not a valid rollout manifest: {0}")]
    InvalidLiveState(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to export variable: {0}")]
    Export(#[from] std::io::Error),
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
