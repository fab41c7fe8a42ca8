use serde::Deserialize;

/// One entry of an application's release history.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleaseRecord {
    /// Commit sha the release was synced to.
    pub revision: String,
    pub commit_message: String,
    pub health_status: Option<String>,
    pub sync_status: Option<String>,
}

// ── Wire shapes for the application timeline query ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineData {
    pub gitops_release_entries: Option<TimelineConnection>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TimelineConnection {
    #[serde(default)]
    pub edges: Vec<TimelineEdge>,
}

#[derive(Debug, Deserialize)]
pub struct TimelineEdge {
    pub node: TimelineNode,
}

#[derive(Debug, Deserialize)]
pub struct TimelineNode {
    pub application: TimelineApplication,
}

#[derive(Debug, Deserialize)]
pub struct TimelineApplication {
    pub status: TimelineStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStatus {
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub health_status: Option<String>,
    #[serde(default)]
    pub sync_status: Option<String>,
}

impl From<TimelineEdge> for ReleaseRecord {
    fn from(edge: TimelineEdge) -> Self {
        let status = edge.node.application.status;
        Self {
            revision: status.revision,
            commit_message: status.commit_message.unwrap_or_default(),
            health_status: status.health_status,
            sync_status: status.sync_status,
        }
    }
}

impl TimelineData {
    /// Flatten the connection into records, keeping backend order.
    pub fn into_records(self) -> Vec<ReleaseRecord> {
        self.gitops_release_entries
            .unwrap_or_default()
            .edges
            .into_iter()
            .map(ReleaseRecord::from)
            .collect()
    }
}
