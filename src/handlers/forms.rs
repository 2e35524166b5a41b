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
use crate::models::form_profile::{FormProfile, NewFormProfile, UpdateFormProfile};
use crate::util::{now_millis, owner_prefix};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProfileListQuery {
    #[serde(default)]
    pub site: Option<String>,
}

/// GET /api/v1/forms
pub async fn list(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Query(params): Query<ProfileListQuery>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "list_form_profiles",
        owner = %owner_prefix(&owner_id),
        "Handler: GET /api/v1/forms"
    );

    let profiles = state
        .store
        .find_form_profiles(&owner_id, params.site.as_deref())
        .await?;
    Ok(Json(profiles))
}

/// GET /api/v1/forms/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .store
        .find_form_profile(&owner_id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Form profile not found".into()))?;
    Ok(Json(profile))
}

/// POST /api/v1/forms
pub async fn create(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Json(body): Json<NewFormProfile>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "create_form_profile",
        owner = %owner_prefix(&owner_id),
        name = %body.name,
        "Handler: POST /api/v1/forms"
    );

    let profile = FormProfile::create(&owner_id, body, now_millis())?;
    state.store.insert_form_profile(&profile).await?;

    tracing::info!(
        handler = "create_form_profile",
        owner = %owner_prefix(&owner_id),
        profile_id = %profile.id,
        status = 201,
        "Responding: form profile created"
    );
    Ok((StatusCode::CREATED, Json(profile)))
}

/// PUT /api/v1/forms/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
    Json(body): Json<UpdateFormProfile>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "update_form_profile",
        owner = %owner_prefix(&owner_id),
        profile_id = %id,
        "Handler: PUT /api/v1/forms/:id"
    );

    let mut profile = state
        .store
        .find_form_profile(&owner_id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Form profile not found".into()))?;

    profile.apply_update(body, now_millis())?;
    state.store.persist_form_profile(&profile).await?;
    Ok(Json(profile))
}

/// DELETE /api/v1/forms/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "delete_form_profile",
        owner = %owner_prefix(&owner_id),
        profile_id = %id,
        "Handler: DELETE /api/v1/forms/:id"
    );

    state.store.delete_form_profile(&owner_id, &id).await?;
    Ok(Json(json!({ "deleted": true })))
}
