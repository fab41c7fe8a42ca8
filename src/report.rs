use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::config::{CiContext, ExportConfig};
use crate::context::RunContext;
use crate::error::Result;
use crate::models::rollout::RolloutState;

/// Deep link to the rollout drawer of the applications dashboard.
pub fn build_dashboard_link(ctx: &RunContext, state: &RolloutState, base_url: &str) -> String {
    let target = &ctx.target;
    let resource = &ctx.settings.resource;
    let enc = |v: &str| urlencoding::encode(v).into_owned();

    let mut url = format!(
        "{}/2.0/applications-dashboard/{}/{}/{}/current-state/tree",
        base_url.trim_end_matches('/'),
        enc(&ctx.runtime.namespace),
        enc(&target.runtime),
        enc(&target.application),
    );

    let params = [
        ("resourceName", target.rollout.as_str()),
        ("resourceKind", resource.kind.as_str()),
        ("resourceVersion", resource.version.as_str()),
        ("namespace", state.namespace.as_str()),
        ("resourceGroup", resource.group.as_str()),
        ("drawer", "app-rollout-details"),
        ("rdName", target.rollout.as_str()),
        ("rdAppName", target.application.as_str()),
        ("rdAppNamespace", ctx.runtime.namespace.as_str()),
        ("rdRevision", state.revision.as_str()),
        ("rdRuntime", target.runtime.as_str()),
        ("rdUID", state.uid.as_str()),
    ];

    let mut sep = '?';
    for (key, value) in params {
        url.push(sep);
        url.push_str(key);
        url.push('=');
        url.push_str(&enc(value));
        sep = '&';
    }
    if let Some(account_id) = ctx.account_id.as_deref().filter(|id| !id.is_empty()) {
        url.push_str("&activeAccountId=");
        url.push_str(&enc(account_id));
    }
    url
}

/// Writes `NAME=value` lines for later pipeline steps.
#[derive(Debug, Clone, Default)]
pub struct VariableExporter {
    files: Vec<PathBuf>,
}

impl VariableExporter {
    /// Files are only written inside a CI build; outside one, exports are just logged.
    pub fn new(ci: Option<&CiContext>, export: &ExportConfig) -> Self {
        let Some(ci) = ci else {
            return Self::default();
        };
        tracing::debug!("exporting variables for build {}", ci.build_id);
        let mut files = Vec::new();
        if let Some(volume) = &ci.volume_path {
            files.push(volume.join("env_vars_to_export"));
        }
        files.push(export.plugin_export_path.clone());
        Self { files }
    }

    pub fn export(&self, name: &str, value: &str) -> Result<()> {
        for path in &self.files {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{name}={value}")?;
        }
        tracing::info!("Exporting variable: {name}={value}");
        Ok(())
    }
}
