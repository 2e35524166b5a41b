use serde::{Deserialize, Serialize};

use super::credential::{Category, CredentialRecord, UsernameType};

/// Body of POST /api/v1/sync.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub device_id: String,
    #[serde(default)]
    pub last_sync: Option<i64>,
    pub credentials: Vec<IncomingCredential>,
}

/// A device-local credential snapshot. Records created offline carry no id;
/// everything except the identity fields is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCredential {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub username_type: Option<UsernameType>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcomes {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub conflicts: Vec<ConflictReport>,
}

/// Two records claim the same website+username identity but share no id.
/// Reported for user-facing resolution; the server mutates nothing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub local: LocalConflictSide,
    pub remote: RemoteConflictSide,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalConflictSide {
    pub id: String,
    pub version: i64,
    pub updated_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConflictSide {
    pub version: Option<i64>,
    pub updated_at: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub results: SyncOutcomes,
    pub pulled_changes: Vec<CredentialRecord>,
    pub timestamp: i64,
}
