use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::matcher::{find_candidates, InputField, MatchQuery};
use crate::middleware::auth::OwnerId;
use crate::models::credential::CredentialRecord;
use crate::repository::CredentialFilters;
use crate::usage::{merge_form_data, FormObservation};
use crate::util::{now_millis, owner_prefix};
use crate::AppState;

/// Query string of GET /api/v1/autofill. `inputFields` arrives JSON-encoded,
/// the way the extension packs structured data into a GET request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofillParams {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub form_id: Option<String>,
    #[serde(default)]
    pub form_action: Option<String>,
    #[serde(default)]
    pub input_fields: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub candidates: Vec<CredentialRecord>,
    pub count: usize,
}

/// GET /api/v1/autofill — rank this owner's credentials against a page/form.
pub async fn find_matches(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Query(params): Query<AutofillParams>,
) -> Result<impl IntoResponse, AppError> {
    let url = params
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::Validation {
            field: "url",
            message: "URL is required for autofill".into(),
        })?;

    tracing::info!(
        handler = "autofill_match",
        owner = %owner_prefix(&owner_id),
        url = %url,
        has_form_id = params.form_id.is_some(),
        "Handler: GET /api/v1/autofill"
    );

    let input_fields: Vec<InputField> = match params.input_fields.as_deref() {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
            .map_err(|e| AppError::BadRequest(format!("Invalid inputFields payload: {e}")))?,
        _ => Vec::new(),
    };

    let query = MatchQuery {
        url,
        form_id: params.form_id,
        form_action: params.form_action,
        input_fields,
    };

    tracing::debug!(handler = "autofill_match", "Dispatching to store.find_by_owner");
    let records = state
        .store
        .find_by_owner(&owner_id, &CredentialFilters::default())
        .await?;

    let candidates = find_candidates(records, &query);

    tracing::info!(
        handler = "autofill_match",
        owner = %owner_prefix(&owner_id),
        count = candidates.len(),
        status = 200,
        "Responding: autofill candidates"
    );
    Ok(Json(MatchResponse {
        count: candidates.len(),
        candidates,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageReport {
    pub form_data: Option<FormObservation>,
}

/// POST /api/v1/autofill/usage/:id — a credential was filled into a page.
/// Bumps recency/frequency and folds in any observed form bindings.
pub async fn record_usage(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Path(id): Path<String>,
    Json(body): Json<UsageReport>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "record_usage",
        owner = %owner_prefix(&owner_id),
        credential_id = %id,
        "Handler: POST /api/v1/autofill/usage/:id"
    );

    let mut record = state
        .store
        .find_by_id(&owner_id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Credential not found".into()))?;

    let now = now_millis();
    record.last_used = Some(now);
    record.use_count += 1;
    record.updated_at = now;

    if let Some(observed) = &body.form_data {
        if merge_form_data(&mut record, observed) {
            // Learned bindings travel to other devices like any other edit.
            record.version += 1;
        }
    }

    state.store.persist(&record).await?;

    tracing::info!(
        handler = "record_usage",
        owner = %owner_prefix(&owner_id),
        credential_id = %record.id,
        use_count = record.use_count,
        status = 200,
        "Responding: usage recorded"
    );
    Ok(Json(serde_json::json!({ "ok": true })))
}
