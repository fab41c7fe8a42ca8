use async_trait::async_trait;

use crate::context::RunContext;
use crate::correlator::{find_by_commit, find_by_correlation_token};
use crate::error::Result;
use crate::models::release::ReleaseRecord;
use crate::models::rollout::{CORRELATION_LABEL, LiveRollout, RolloutLookup};
use crate::models::target::CorrelationStrategy;
use crate::poll_loop::ReadRollout;
use crate::status_client::StatusClient;

/// Reads the live rollout and decides whether it belongs to the monitored release.
pub struct RolloutStateReader<'a, C: StatusClient + ?Sized> {
    client: &'a C,
    ctx: &'a RunContext,
}

impl<'a, C: StatusClient + ?Sized> RolloutStateReader<'a, C> {
    pub fn new(client: &'a C, ctx: &'a RunContext) -> Self {
        Self { client, ctx }
    }

    /// `NotFound` when the resource is absent or doesn't correlate; errors only
    /// for failed queries and unparseable payloads.
    pub async fn read(&self) -> Result<RolloutLookup> {
        let ctx = self.ctx;
        let raw = self
            .client
            .fetch_live_resource(&ctx.runtime.ingress_host, ctx.resource_query())
            .await?;

        let Some(live) = LiveRollout::parse(&raw)? else {
            tracing::info!(
                "{} '{}' has no live state (yet)",
                ctx.settings.resource.kind,
                ctx.target.rollout
            );
            return Ok(RolloutLookup::NotFound);
        };

        let correlated = match &ctx.target.correlation {
            CorrelationStrategy::RolloutLabel(id) => {
                let label = live.label(CORRELATION_LABEL).unwrap_or_default();
                if label != id.as_str() {
                    tracing::info!(
                        "Rollout with {CORRELATION_LABEL} = '{id}' couldn't be found (yet), live rollout has '{label}'"
                    );
                }
                label == id.as_str()
            }
            CorrelationStrategy::ReleaseToken(id) => {
                let history = self.history().await?;
                let found = find_by_correlation_token(&history, id)?.is_some();
                if !found {
                    tracing::info!(
                        "no release with {CORRELATION_LABEL} = '{id}' in the last {} releases (yet)",
                        history.len()
                    );
                }
                found
            }
            CorrelationStrategy::Commit(sha) => {
                let history = self.history().await?;
                let found = find_by_commit(&history, sha).is_some();
                if !found {
                    tracing::info!(
                        "no release for commit {sha} in the last {} releases (yet)",
                        history.len()
                    );
                }
                found
            }
        };

        if !correlated {
            return Ok(RolloutLookup::NotFound);
        }
        Ok(RolloutLookup::Found(live.into_state()))
    }

    async fn history(&self) -> Result<Vec<ReleaseRecord>> {
        Ok(self
            .client
            .fetch_release_history(self.ctx.history_query())
            .await?)
    }
}

#[async_trait]
impl<C: StatusClient + ?Sized> ReadRollout for RolloutStateReader<'_, C> {
    async fn read(&mut self) -> Result<RolloutLookup> {
        RolloutStateReader::read(&*self).await
    }
}
