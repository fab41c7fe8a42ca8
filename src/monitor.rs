use tracing::Instrument;

use crate::config::MonitorConfig;
use crate::context::RunContext;
use crate::error::{MonitorError, Result};
use crate::poll_loop::{PollPolicy, RolloutOutcome, Sleeper, wait_for_existence, wait_for_terminal};
use crate::report::{VariableExporter, build_dashboard_link};
use crate::state_reader::RolloutStateReader;
use crate::status_client::StatusClient;

/// One full monitoring run: find the correlated rollout, export its dashboard
/// link, wait for a terminal phase and export that phase.
///
/// Both exports are written before a failed rollout is reported as an error.
pub async fn run<C, S>(
    config: &MonitorConfig,
    client: &C,
    sleeper: &S,
    exporter: &VariableExporter,
) -> Result<RolloutOutcome>
where
    C: StatusClient + ?Sized,
    S: Sleeper + ?Sized,
{
    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "rollout_monitor",
        run_id = %run_id,
        runtime = %config.target.runtime,
        application = %config.target.application,
        rollout = %config.target.rollout,
    );
    execute(config, client, sleeper, exporter)
        .instrument(span)
        .await
}

async fn execute<C, S>(
    config: &MonitorConfig,
    client: &C,
    sleeper: &S,
    exporter: &VariableExporter,
) -> Result<RolloutOutcome>
where
    C: StatusClient + ?Sized,
    S: Sleeper + ?Sized,
{
    let started = chrono::Utc::now();
    let target = &config.target;
    let settings = &config.settings;
    let parameters = pretty(&target.parameters());
    tracing::info!("Monitoring the following Rollout:\n{parameters}");

    let runtime = client.fetch_runtime(&target.runtime).await?;
    tracing::info!(
        "runtime {} resolved: namespace={} ingress={}",
        runtime.name,
        runtime.namespace,
        runtime.ingress_host
    );

    let mut ctx = RunContext::new(target.clone(), runtime, settings.clone());
    let policy = PollPolicy {
        interval: settings.interval(),
        existence_attempts: settings.existence_attempts(),
    };
    let horizon = settings.history.page_size;

    let found = {
        let mut reader = RolloutStateReader::new(client, &ctx);
        wait_for_existence(&mut reader, sleeper, policy, horizon).await
    };
    let state = match found {
        Ok(state) => state,
        Err(err @ MonitorError::TargetNotFound { .. }) => {
            tracing::warn!(
                "{err}. Searched for the following Rollout:\n{parameters}\n\
                 Increase RELEASES_TO_RETRIEVE (currently {horizon}) if the release is older."
            );
            return Err(err);
        }
        Err(err) => return Err(err),
    };
    tracing::info!(
        "Rollout found: {}/{} revision {} ({})",
        state.namespace,
        state.name,
        state.revision,
        state.phase
    );

    match client.fetch_account_id().await {
        Ok(account_id) => ctx.account_id = account_id,
        Err(err) => tracing::warn!("could not resolve the active account, link will omit it: {err}"),
    }

    let link = build_dashboard_link(&ctx, &state, &settings.backend.url);
    let step = &settings.export.step_name;
    exporter.export(&format!("{step}_CF_OUTPUT_URL"), &link)?;

    let outcome = {
        let mut reader = RolloutStateReader::new(client, &ctx);
        wait_for_terminal(&mut reader, sleeper, policy, state).await?
    };

    match &outcome.state {
        Some(state) => tracing::info!("Rollout State:\n{}", pretty(state)),
        None => tracing::warn!("Rollout State: no longer present"),
    }
    tracing::info!("Rollout Status --> {}", outcome.phase);
    exporter.export(step, outcome.phase.as_str())?;

    let elapsed = chrono::Utc::now() - started;
    tracing::info!(
        "run finished in {}s after {} status reads",
        elapsed.num_seconds(),
        outcome.reads
    );

    if !outcome.succeeded() {
        return Err(MonitorError::RolloutFailed {
            phase: outcome.phase,
        });
    }
    Ok(outcome)
}

fn pretty<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "<unprintable>".to_string())
}
