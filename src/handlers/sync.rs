use axum::{extract::State, response::IntoResponse, Extension, Json};

use crate::error::AppError;
use crate::middleware::auth::OwnerId;
use crate::models::sync::SyncRequest;
use crate::reconciler::reconcile;
use crate::util::{now_millis, owner_prefix};
use crate::AppState;

/// POST /api/v1/sync — merge a device's snapshot batch and hand back the
/// changes it has not seen.
pub async fn sync(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Json(body): Json<SyncRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "sync",
        owner = %owner_prefix(&owner_id),
        device_id = %body.device_id,
        batch_size = body.credentials.len(),
        last_sync = ?body.last_sync,
        "Handler: POST /api/v1/sync"
    );

    if !state.rate_limiter.check(&owner_id).await {
        return Err(AppError::TooManyRequests("Rate limit exceeded".into()));
    }

    if body.device_id.trim().is_empty() {
        tracing::warn!(handler = "sync", "Validation failed: missing device id");
        return Err(AppError::Validation {
            field: "deviceId",
            message: "deviceId is required".into(),
        });
    }
    if body.credentials.len() > state.max_sync_batch {
        return Err(AppError::BadRequest(format!(
            "Sync batch exceeds the limit of {} credentials",
            state.max_sync_batch
        )));
    }

    tracing::debug!(handler = "sync", "Dispatching to reconciler");
    let response = reconcile(
        state.store.as_ref(),
        &owner_id,
        &body.device_id,
        body.last_sync,
        &body.credentials,
        now_millis(),
    )
    .await?;

    tracing::info!(
        handler = "sync",
        owner = %owner_prefix(&owner_id),
        device_id = %body.device_id,
        created = response.results.created.len(),
        updated = response.results.updated.len(),
        unchanged = response.results.unchanged.len(),
        conflicts = response.results.conflicts.len(),
        pulled = response.pulled_changes.len(),
        status = 200,
        "Responding: sync complete"
    );

    Ok(Json(response))
}
