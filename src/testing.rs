//! In-memory doubles shared by the unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::MonitorSettings;
use crate::context::RunContext;
use crate::error::{BackendError, MonitorError, Result};
use crate::models::release::ReleaseRecord;
use crate::models::rollout::{RolloutLookup, RolloutPhase, RolloutState};
use crate::models::runtime::RuntimeInfo;
use crate::models::target::{CorrelationStrategy, Target};
use crate::poll_loop::{ReadRollout, Sleeper};
use crate::status_client::{HistoryQuery, ResourceQuery, StatusClient};

pub fn target(correlation: CorrelationStrategy) -> Target {
    Target {
        runtime: "prod-eu".to_string(),
        application: "checkout".to_string(),
        application_namespace: None,
        rollout: "checkout-rollout".to_string(),
        correlation,
    }
}

pub fn runtime() -> RuntimeInfo {
    RuntimeInfo {
        name: "prod-eu".to_string(),
        namespace: "codefresh".to_string(),
        ingress_host: "https://prod-eu.example.com".to_string(),
    }
}

pub fn context(correlation: CorrelationStrategy) -> RunContext {
    RunContext::new(target(correlation), runtime(), MonitorSettings::default())
}

/// A live-state manifest for `checkout-rollout`; an empty id omits the label.
pub fn live_state(rollout_id: &str, phase: &str) -> String {
    let mut labels = serde_json::json!({ "app": "checkout" });
    if !rollout_id.is_empty() {
        labels["multiClusterRolloutId"] = serde_json::json!(rollout_id);
    }
    serde_json::json!({
        "apiVersion": "argoproj.io/v1alpha1",
        "kind": "Rollout",
        "metadata": {
            "name": "checkout-rollout",
            "namespace": "shop",
            "resourceVersion": "1001",
            "uid": "uid-1",
            "labels": labels,
            "annotations": { "rollout.argoproj.io/revision": "3" }
        },
        "status": { "phase": phase, "readyReplicas": 1, "replicas": 3 }
    })
    .to_string()
}

pub fn state_with_phase(phase: RolloutPhase) -> RolloutState {
    RolloutState {
        name: "checkout-rollout".to_string(),
        namespace: "shop".to_string(),
        resource_version: "1001".to_string(),
        uid: "uid-1".to_string(),
        labels: BTreeMap::from([("multiClusterRolloutId".to_string(), "abc123".to_string())]),
        revision: "3".to_string(),
        phase,
        ready_replicas: 1,
        replicas: 3,
    }
}

fn graphql_failure() -> BackendError {
    BackendError::GraphQl {
        query: "getResource",
        messages: vec!["upstream unavailable".to_string()],
    }
}

/// Canned backend. Live states are served in order; the last one repeats.
#[derive(Default)]
pub struct StubClient {
    live_states: Mutex<VecDeque<String>>,
    history: Vec<ReleaseRecord>,
    account_id: Option<String>,
    fail: bool,
    live_calls: AtomicUsize,
    history_calls: AtomicUsize,
}

impl StubClient {
    pub fn with_live_states(states: Vec<String>) -> Self {
        Self {
            live_states: Mutex::new(states.into()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn history(mut self, history: Vec<ReleaseRecord>) -> Self {
        self.history = history;
        self
    }

    pub fn account(mut self, id: &str) -> Self {
        self.account_id = Some(id.to_string());
        self
    }

    pub fn live_calls(&self) -> usize {
        self.live_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusClient for StubClient {
    async fn fetch_runtime(&self, _runtime: &str) -> Result<RuntimeInfo, BackendError> {
        if self.fail {
            return Err(graphql_failure());
        }
        Ok(runtime())
    }

    async fn fetch_release_history(
        &self,
        query: HistoryQuery<'_>,
    ) -> Result<Vec<ReleaseRecord>, BackendError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.history.iter().take(query.page_size).cloned().collect())
    }

    async fn fetch_live_resource(
        &self,
        _ingress_host: &str,
        _query: ResourceQuery<'_>,
    ) -> Result<String, BackendError> {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(graphql_failure());
        }
        let mut states = self.live_states.lock().unwrap();
        let state = if states.len() > 1 {
            states.pop_front().unwrap_or_default()
        } else {
            states.front().cloned().unwrap_or_default()
        };
        Ok(state)
    }

    async fn fetch_account_id(&self) -> Result<Option<String>, BackendError> {
        Ok(self.account_id.clone())
    }
}

#[derive(Debug, Clone)]
enum Step {
    NotFound,
    Phase(RolloutPhase),
    Fail,
}

/// Reader that replays a fixed script; the last step repeats.
pub struct ScriptedReader {
    steps: VecDeque<Step>,
    reads: u64,
}

impl ScriptedReader {
    pub fn not_found_then(misses: usize, phases: &[RolloutPhase]) -> Self {
        let mut steps: VecDeque<Step> = std::iter::repeat_n(Step::NotFound, misses).collect();
        steps.extend(phases.iter().copied().map(Step::Phase));
        Self { steps, reads: 0 }
    }

    pub fn phases(phases: &[RolloutPhase]) -> Self {
        Self::not_found_then(0, phases)
    }

    pub fn failing_after(misses: usize) -> Self {
        let mut reader = Self::not_found_then(misses, &[]);
        reader.steps.push_back(Step::Fail);
        reader
    }

    pub fn then_not_found(mut self) -> Self {
        self.steps.push_back(Step::NotFound);
        self
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }
}

#[async_trait]
impl ReadRollout for ScriptedReader {
    async fn read(&mut self) -> Result<RolloutLookup> {
        self.reads += 1;
        let step = if self.steps.len() > 1 {
            self.steps.pop_front()
        } else {
            self.steps.front().cloned()
        };
        match step.unwrap_or(Step::NotFound) {
            Step::NotFound => Ok(RolloutLookup::NotFound),
            Step::Phase(phase) => Ok(RolloutLookup::Found(state_with_phase(phase))),
            Step::Fail => Err(MonitorError::Backend(graphql_failure())),
        }
    }
}

/// Records requested sleeps without waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn count(&self) -> usize {
        self.slept.lock().unwrap().len()
    }

    pub fn durations(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
