use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub credentials: CredentialMetrics,
    pub form_profiles: i64,
    pub collected_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialMetrics {
    pub total: i64,
    pub owners: i64,
    pub shared: i64,
    pub weak: i64,
    pub average_strength: f64,
}
