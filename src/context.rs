use crate::config::MonitorSettings;
use crate::models::runtime::RuntimeInfo;
use crate::models::target::Target;
use crate::status_client::{HistoryQuery, ResourceQuery};

/// Per-run state resolved once at start-up and passed to every component.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub target: Target,
    pub runtime: RuntimeInfo,
    pub settings: MonitorSettings,
    /// Filled in once the rollout is found; absent if the lookup fails.
    pub account_id: Option<String>,
}

impl RunContext {
    pub fn new(target: Target, runtime: RuntimeInfo, settings: MonitorSettings) -> Self {
        Self {
            target,
            runtime,
            settings,
            account_id: None,
        }
    }

    pub fn application_namespace(&self) -> &str {
        self.target.namespace_or(&self.runtime.namespace)
    }

    pub fn resource_query(&self) -> ResourceQuery<'_> {
        ResourceQuery {
            application: &self.target.application,
            name: &self.target.rollout,
            kind: &self.settings.resource.kind,
            version: &self.settings.resource.version,
            group: &self.settings.resource.group,
        }
    }

    pub fn history_query(&self) -> HistoryQuery<'_> {
        HistoryQuery {
            application: &self.target.application,
            namespace: self.application_namespace(),
            runtime: &self.target.runtime,
            page_size: self.settings.history.page_size,
        }
    }
}
