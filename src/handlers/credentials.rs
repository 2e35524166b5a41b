use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::middleware::auth::OwnerId;
use crate::models::credential::{AccessLevel, CredentialRecord, NewCredential, UpdateCredential};
use crate::repository::CredentialFilters;
use crate::strength::strength_suggestions;
use crate::util::{now_millis, owner_prefix};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
}

/// GET /api/v1/credentials — list the owner's credentials, newest first.
pub async fn list(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Query(params): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "list_credentials",
        owner = %owner_prefix(&owner_id),
        "Handler: GET /api/v1/credentials"
    );

    let filters = CredentialFilters {
        category: params.category,
        site: params.site,
    };
    let records = state.store.find_by_owner(&owner_id, &filters).await?;

    tracing::info!(
        handler = "list_credentials",
        owner = %owner_prefix(&owner_id),
        returned = records.len(),
        status = 200,
        "Responding: credential list"
    );
    Ok(Json(records))
}

/// GET /api/v1/credentials/site/:domain — credentials whose website or url
/// mentions the domain.
pub async fn list_by_site(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(domain): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "list_by_site",
        owner = %owner_prefix(&owner_id),
        domain = %domain,
        "Handler: GET /api/v1/credentials/site/:domain"
    );

    let filters = CredentialFilters {
        category: None,
        site: Some(domain),
    };
    let records = state.store.find_by_owner(&owner_id, &filters).await?;
    Ok(Json(records))
}

/// GET /api/v1/credentials/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "get_credential",
        owner = %owner_prefix(&owner_id),
        credential_id = %id,
        "Handler: GET /api/v1/credentials/:id"
    );

    let record = state
        .store
        .find_by_id(&owner_id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Credential not found".into()))?;
    Ok(Json(record))
}

/// POST /api/v1/credentials — create, 201 on success.
pub async fn create(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Json(body): Json<NewCredential>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "create_credential",
        owner = %owner_prefix(&owner_id),
        website = %body.website,
        "Handler: POST /api/v1/credentials"
    );

    let record = CredentialRecord::create(&owner_id, body, now_millis())?;

    tracing::debug!(handler = "create_credential", "Dispatching to store.insert");
    state.store.insert(&record).await?;

    tracing::info!(
        handler = "create_credential",
        owner = %owner_prefix(&owner_id),
        credential_id = %record.id,
        strength = record.password_strength,
        status = 201,
        "Responding: credential created"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/v1/credentials/:id — full-field replace.
pub async fn update(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
    Json(body): Json<UpdateCredential>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "update_credential",
        owner = %owner_prefix(&owner_id),
        credential_id = %id,
        "Handler: PUT /api/v1/credentials/:id"
    );

    let mut record = state
        .store
        .find_by_id(&owner_id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Credential not found".into()))?;

    record.apply_update(body, now_millis())?;

    tracing::debug!(handler = "update_credential", "Dispatching to store.persist");
    state.store.persist(&record).await?;

    tracing::info!(
        handler = "update_credential",
        owner = %owner_prefix(&owner_id),
        credential_id = %record.id,
        version = record.version,
        status = 200,
        "Responding: credential updated"
    );
    Ok(Json(record))
}

/// DELETE /api/v1/credentials/:id — hard delete; offline devices will not
/// learn about it through sync (no tombstones).
pub async fn delete(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "delete_credential",
        owner = %owner_prefix(&owner_id),
        credential_id = %id,
        "Handler: DELETE /api/v1/credentials/:id"
    );

    state.store.delete(&owner_id, &id).await?;

    tracing::info!(
        handler = "delete_credential",
        owner = %owner_prefix(&owner_id),
        credential_id = %id,
        status = 200,
        "Responding: credential deleted"
    );
    Ok(Json(json!({ "deleted": true })))
}

/// GET /api/v1/credentials/:id/strength
pub async fn strength(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .store
        .find_by_id(&owner_id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Credential not found".into()))?;

    let suggestions = strength_suggestions(&record.password, record.password_strength);
    Ok(Json(json!({
        "passwordStrength": record.password_strength,
        "suggestions": suggestions,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShareRequest {
    pub target_user_id: String,
    pub access_level: AccessLevel,
}

/// POST /api/v1/credentials/:id/share — grant another account access.
pub async fn share(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
    Json(body): Json<ShareRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "share_credential",
        owner = %owner_prefix(&owner_id),
        credential_id = %id,
        "Handler: POST /api/v1/credentials/:id/share"
    );

    if body.target_user_id.trim().is_empty() {
        return Err(AppError::Validation {
            field: "targetUserId",
            message: "targetUserId is required".into(),
        });
    }

    let mut record = state
        .store
        .find_by_id(&owner_id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Credential not found".into()))?;

    record.share_with(&body.target_user_id, body.access_level, now_millis());
    state.store.persist(&record).await?;

    Ok(Json(record))
}

/// GET /api/v1/credentials/shared — records other accounts shared with me.
pub async fn shared_with_me(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
) -> Result<impl IntoResponse, AppError> {
    let records = state.store.find_shared_with(&owner_id).await?;
    Ok(Json(records))
}
