use serde::Deserialize;

/// Runtime details resolved once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub name: String,
    pub namespace: String,
    pub ingress_host: String,
}

// ── Wire shapes for `getRuntime` ──

#[derive(Debug, Deserialize)]
pub struct RuntimeData {
    pub runtime: Option<RuntimeNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeNode {
    pub metadata: RuntimeMetadata,
    #[serde(default)]
    pub ingress_host: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RuntimeMetadata {
    pub name: Option<String>,
    pub namespace: Option<String>,
}

// ── Wire shapes for `GET /api/user` ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub active_account_name: String,
    #[serde(default)]
    pub account: Vec<UserAccount>,
}

#[derive(Debug, Deserialize)]
pub struct UserAccount {
    pub name: String,
    #[serde(alias = "_id")]
    pub id: String,
}

impl UserInfo {
    /// Id of the account named by `activeAccountName`, if listed.
    pub fn active_account_id(&self) -> Option<&str> {
        self.account
            .iter()
            .find(|a| a.name == self.active_account_name)
            .map(|a| a.id.as_str())
    }
}
