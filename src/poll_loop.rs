//! The two polling phases of a run.
//!
//! The existence phase retries a bounded number of times until a correlated
//! rollout shows up. The status phase then polls with no upper bound until the
//! rollout reaches a terminal phase; the invoking CI job's own timeout is the
//! only thing that can cut it short.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{MonitorError, Result};
use crate::models::rollout::{PhaseClass, RolloutLookup, RolloutPhase, RolloutState};

/// One read of the live rollout.
#[async_trait]
pub trait ReadRollout: Send {
    async fn read(&mut self) -> Result<RolloutLookup>;
}

/// Pause between polls. Tests swap in a recorder instead of real time.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Maximum reads in the existence phase.
    pub existence_attempts: u64,
}

/// How the status phase ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutOutcome {
    pub phase: RolloutPhase,
    /// Last state read; `None` when the rollout vanished mid-run.
    pub state: Option<RolloutState>,
    /// Reads made after the existence phase.
    pub reads: u64,
}

impl RolloutOutcome {
    pub fn succeeded(&self) -> bool {
        self.phase.classify() == PhaseClass::Success
    }
}

/// Read until a correlated rollout is found or the attempt budget is spent.
///
/// `horizon` is only used to word the `TargetNotFound` error.
pub async fn wait_for_existence<R, S>(
    reader: &mut R,
    sleeper: &S,
    policy: PollPolicy,
    horizon: usize,
) -> Result<RolloutState>
where
    R: ReadRollout + ?Sized,
    S: Sleeper + ?Sized,
{
    let budget = policy.existence_attempts.max(1);
    for attempt in 1..=budget {
        if let RolloutLookup::Found(state) = reader.read().await? {
            if attempt > 1 {
                tracing::info!("rollout found after {attempt} attempts");
            }
            return Ok(state);
        }
        if attempt < budget {
            tracing::info!("Rollout not found, please check your parameters. x{attempt}");
            sleeper.sleep(policy.interval).await;
        }
    }
    Err(MonitorError::TargetNotFound {
        attempts: budget,
        horizon,
    })
}

/// Follow the rollout from the state the existence phase found until it
/// leaves Progressing/Paused. A terminal `initial` state is returned without
/// another read.
pub async fn wait_for_terminal<R, S>(
    reader: &mut R,
    sleeper: &S,
    policy: PollPolicy,
    initial: RolloutState,
) -> Result<RolloutOutcome>
where
    R: ReadRollout + ?Sized,
    S: Sleeper + ?Sized,
{
    let mut phase = initial.phase;
    let mut state = Some(initial);
    let mut reads = 0;
    while phase.classify() == PhaseClass::Continue {
        tracing::info!(
            phase = %phase,
            ready = state.as_ref().map_or(0, |s| s.ready_replicas),
            replicas = state.as_ref().map_or(0, |s| s.replicas),
            "rollout {phase}"
        );
        sleeper.sleep(policy.interval).await;

        reads += 1;
        (phase, state) = match reader.read().await? {
            RolloutLookup::Found(found) => (found.phase, Some(found)),
            RolloutLookup::NotFound => {
                tracing::warn!("rollout disappeared while waiting for a terminal phase");
                (RolloutPhase::Unknown, None)
            }
        };
    }
    Ok(RolloutOutcome {
        phase,
        state,
        reads,
    })
}
