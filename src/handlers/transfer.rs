use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::export::{export_csv, export_json, parse_import};
use crate::middleware::auth::OwnerId;
use crate::models::credential::{CredentialRecord, ExportFormat, NewCredential};
use crate::repository::CredentialFilters;
use crate::util::{now_millis, owner_prefix};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FormatQuery {
    #[serde(default)]
    pub format: Option<String>,
}

fn parse_format(raw: Option<&str>) -> Result<ExportFormat, AppError> {
    match raw {
        Some("json") => Ok(ExportFormat::Json),
        Some("csv") => Ok(ExportFormat::Csv),
        _ => Err(AppError::BadRequest(
            "Unsupported format. Use json or csv".into(),
        )),
    }
}

/// GET /api/v1/credentials/export?format=json|csv
///
/// Every exported record gets an export-history entry; the body itself is
/// sanitized (no ids, no version counters).
pub async fn export(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Query(params): Query<FormatQuery>,
) -> Result<impl IntoResponse, AppError> {
    let format = parse_format(params.format.as_deref())?;

    tracing::info!(
        handler = "export_credentials",
        owner = %owner_prefix(&owner_id),
        format = ?format,
        "Handler: GET /api/v1/credentials/export"
    );

    let mut records = state
        .store
        .find_by_owner(&owner_id, &CredentialFilters::default())
        .await?;
    if records.is_empty() {
        return Err(AppError::NotFound("No credentials found".into()));
    }

    let now = now_millis();
    let (content_type, filename, body) = match format {
        ExportFormat::Json => (
            "application/json",
            "credentials.json",
            export_json(&records, now)?,
        ),
        ExportFormat::Csv => ("text/csv", "credentials.csv", export_csv(&records, now)),
    };

    for record in &mut records {
        record.note_export(format, now);
        if let Err(e) = state.store.persist(record).await {
            tracing::warn!(
                credential_id = %record.id,
                error = %e,
                "Failed to append export history entry"
            );
        }
    }

    tracing::info!(
        handler = "export_credentials",
        owner = %owner_prefix(&owner_id),
        exported = records.len(),
        status = 200,
        "Responding: export document"
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportRequest {
    pub data: String,
}

/// POST /api/v1/credentials/import?format=json|csv
///
/// An unparseable document fails the whole batch; a parsed row missing its
/// identity fields is skipped and counted.
pub async fn import(
    State(state): State<AppState>,
    Extension(OwnerId(owner_id)): Extension<OwnerId>,
    Query(params): Query<FormatQuery>,
    Json(body): Json<ImportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let format = parse_format(params.format.as_deref())?;

    tracing::info!(
        handler = "import_credentials",
        owner = %owner_prefix(&owner_id),
        format = ?format,
        "Handler: POST /api/v1/credentials/import"
    );

    if body.data.trim().is_empty() {
        return Err(AppError::Validation {
            field: "data",
            message: "No data provided".into(),
        });
    }

    let rows = parse_import(&body.data, format)?;
    let source = match format {
        ExportFormat::Json => "json",
        ExportFormat::Csv => "csv",
    };

    let mut imported = 0usize;
    let mut skipped = 0usize;
    let now = now_millis();

    for (index, row) in rows.into_iter().enumerate() {
        let new = NewCredential {
            website: row.website,
            url: row.url,
            url_patterns: Vec::new(),
            domain_only: false,
            username: row.username,
            username_type: None,
            password: row.password,
            notes: row.notes,
            category: row.category,
            device_id: None,
        };
        match CredentialRecord::create(&owner_id, new, now) {
            Ok(mut record) => {
                record.import_source = Some(source.to_string());
                state.store.insert(&record).await?;
                imported += 1;
            }
            Err(e) => {
                tracing::warn!(
                    row_index = index,
                    error = %e,
                    "Import row rejected; continuing"
                );
                skipped += 1;
            }
        }
    }

    tracing::info!(
        handler = "import_credentials",
        owner = %owner_prefix(&owner_id),
        imported,
        skipped,
        status = 201,
        "Responding: import complete"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Successfully imported {imported} credentials"),
            "imported": imported,
            "skipped": skipped,
        })),
    ))
}
