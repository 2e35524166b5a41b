use async_trait::async_trait;

use crate::error::AppError;
use crate::models::credential::CredentialRecord;
use crate::models::form_profile::FormProfile;
use crate::models::metrics::Metrics;

/// Owner-scoped query filters for credential listings.
#[derive(Debug, Default, Clone)]
pub struct CredentialFilters {
    /// Exact category name (`personal`, `work`, ...).
    pub category: Option<String>,
    /// Case-insensitive substring matched against website and url.
    pub site: Option<String>,
}

/// Persistence contract for credentials and form profiles.
///
/// Every operation is scoped by owner; a record owned by someone else is
/// reported as absent, never as forbidden. Single-record writes are atomic;
/// the only concurrency control is the record's own version counter.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<CredentialRecord>, AppError>;
    async fn find_by_owner(
        &self,
        owner_id: &str,
        filters: &CredentialFilters,
    ) -> Result<Vec<CredentialRecord>, AppError>;
    /// The reconciler's same-identity probe: website + username equality.
    async fn find_similar(
        &self,
        owner_id: &str,
        website: &str,
        username: &str,
    ) -> Result<Option<CredentialRecord>, AppError>;
    /// Records shared with this owner by other accounts.
    async fn find_shared_with(&self, owner_id: &str) -> Result<Vec<CredentialRecord>, AppError>;
    /// Records touched after `since` (millis), newest first.
    async fn changed_since(
        &self,
        owner_id: &str,
        since: i64,
    ) -> Result<Vec<CredentialRecord>, AppError>;

    async fn insert(&self, record: &CredentialRecord) -> Result<(), AppError>;
    /// Write back an already-mutated record. `NotFound` if the row vanished.
    async fn persist(&self, record: &CredentialRecord) -> Result<(), AppError>;
    async fn delete(&self, owner_id: &str, id: &str) -> Result<(), AppError>;

    async fn insert_form_profile(&self, profile: &FormProfile) -> Result<(), AppError>;
    async fn find_form_profiles(
        &self,
        owner_id: &str,
        site: Option<&str>,
    ) -> Result<Vec<FormProfile>, AppError>;
    async fn find_form_profile(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<FormProfile>, AppError>;
    async fn persist_form_profile(&self, profile: &FormProfile) -> Result<(), AppError>;
    async fn delete_form_profile(&self, owner_id: &str, id: &str) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
    async fn get_metrics(&self) -> Result<Metrics, AppError>;
}
