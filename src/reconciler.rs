//! Multi-device sync reconciliation.
//!
//! Each incoming snapshot is merged against server state using the record's
//! version counter as the sole ordering authority; timestamps are reported but
//! never decide a merge. Devices that created a record offline before learning
//! its server id are caught by the website+username identity probe and
//! surfaced as conflicts for user-facing resolution.

use crate::error::AppError;
use crate::models::credential::{CredentialRecord, NewCredential};
use crate::models::sync::{
    ConflictReport, IncomingCredential, LocalConflictSide, RemoteConflictSide, SyncOutcomes,
    SyncResponse,
};
use crate::repository::CredentialStore;
use crate::strength::score_password;

enum Outcome {
    Created(String),
    Updated(String),
    Unchanged(String),
    Conflict(ConflictReport),
}

/// Run a device's sync batch and collect the changes it has not seen yet.
///
/// One snapshot's failure never aborts the batch; the entry is logged and the
/// remaining snapshots are still processed.
pub async fn reconcile(
    store: &dyn CredentialStore,
    owner_id: &str,
    device_id: &str,
    last_sync: Option<i64>,
    batch: &[IncomingCredential],
    now: i64,
) -> Result<SyncResponse, AppError> {
    let mut results = SyncOutcomes::default();

    for (index, incoming) in batch.iter().enumerate() {
        match reconcile_one(store, owner_id, device_id, incoming, now).await {
            Ok(Outcome::Created(id)) => results.created.push(id),
            Ok(Outcome::Updated(id)) => results.updated.push(id),
            Ok(Outcome::Unchanged(id)) => results.unchanged.push(id),
            Ok(Outcome::Conflict(report)) => results.conflicts.push(report),
            Err(e) => {
                tracing::warn!(
                    entry_index = index,
                    incoming_id = ?incoming.id,
                    error = %e,
                    "Sync entry failed; continuing with remaining batch"
                );
            }
        }
    }

    // Changes made elsewhere that this device has not pulled yet.
    let pulled_changes: Vec<CredentialRecord> = store
        .changed_since(owner_id, last_sync.unwrap_or(0))
        .await?
        .into_iter()
        .filter(|record| !record.device_ids.iter().any(|d| d == device_id))
        .collect();

    Ok(SyncResponse {
        results,
        pulled_changes,
        timestamp: now,
    })
}

async fn reconcile_one(
    store: &dyn CredentialStore,
    owner_id: &str,
    device_id: &str,
    incoming: &IncomingCredential,
    now: i64,
) -> Result<Outcome, AppError> {
    if let Some(id) = incoming.id.as_deref().filter(|id| !id.is_empty()) {
        if let Some(mut existing) = store.find_by_id(owner_id, id).await? {
            let incoming_version = incoming.version.unwrap_or(0);
            if incoming_version > existing.version {
                apply_incoming(&mut existing, incoming, device_id, now);
                store.persist(&existing).await?;
                return Ok(Outcome::Updated(existing.id));
            }
            // Equal versions favor the server copy: last writer does not win.
            return Ok(Outcome::Unchanged(existing.id));
        }
    }

    // No id, or an id this server has never assigned: probe by identity.
    let website = incoming.website.as_deref().unwrap_or_default();
    let username = incoming.username.as_deref().unwrap_or_default();
    if !website.is_empty() && !username.is_empty() {
        if let Some(similar) = store.find_similar(owner_id, website, username).await? {
            return Ok(Outcome::Conflict(ConflictReport {
                local: LocalConflictSide {
                    id: similar.id,
                    version: similar.version,
                    updated_at: similar.updated_at,
                },
                remote: RemoteConflictSide {
                    version: incoming.version,
                    updated_at: incoming.updated_at,
                },
            }));
        }
    }

    let mut record = CredentialRecord::create(
        owner_id,
        NewCredential {
            website: incoming.website.clone().unwrap_or_default(),
            url: incoming.url.clone(),
            url_patterns: Vec::new(),
            domain_only: false,
            username: incoming.username.clone().unwrap_or_default(),
            username_type: incoming.username_type,
            password: incoming.password.clone().unwrap_or_default(),
            notes: incoming.notes.clone(),
            category: incoming.category,
            device_id: Some(device_id.to_string()),
        },
        now,
    )?;
    record.version = incoming.version.unwrap_or(1).max(1);
    record.last_synced = Some(now);
    store.insert(&record).await?;
    Ok(Outcome::Created(record.id))
}

/// Incoming wins: replace the mutable fields, adopt the incoming version
/// verbatim, and mark this device as synced.
fn apply_incoming(
    existing: &mut CredentialRecord,
    incoming: &IncomingCredential,
    device_id: &str,
    now: i64,
) {
    if let Some(website) = incoming.website.as_deref().filter(|w| !w.is_empty()) {
        existing.website = website.to_string();
    }
    if let Some(username) = incoming.username.as_deref().filter(|u| !u.is_empty()) {
        existing.username = username.to_string();
    }
    if let Some(password) = incoming.password.as_deref().filter(|p| !p.is_empty()) {
        if existing.password != password {
            existing.password_strength = score_password(password);
            existing.password = password.to_string();
        }
    }
    if incoming.url.is_some() {
        existing.url = incoming.url.clone();
    }
    if incoming.notes.is_some() {
        existing.notes = incoming.notes.clone();
    }
    if let Some(category) = incoming.category {
        existing.category = category;
    }

    existing.version = incoming.version.unwrap_or(existing.version);
    existing.touch_device(device_id);
    existing.last_synced = Some(now);
    existing.updated_at = now;
}
