//! Credential export and import.
//!
//! Exports are sanitized: site, login and category fields only, no internal
//! ids or version counters. Imports accept the same JSON shape or a CSV whose
//! first row names its columns. A document that cannot be parsed fails the
//! whole batch; a parsed row missing identity fields is skipped and counted.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::credential::{Category, CredentialRecord, ExportFormat};

const CSV_HEADER: &str = "website,url,username,password,notes,category,exportedAt";

/// One record as it appears in an export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedCredential {
    pub website: String,
    #[serde(default)]
    pub url: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub exported_at: Option<i64>,
}

impl ExportedCredential {
    fn from_record(record: &CredentialRecord, now: i64) -> Self {
        Self {
            website: record.website.clone(),
            url: record.url.clone(),
            username: record.username.clone(),
            password: record.password.clone(),
            notes: record.notes.clone(),
            category: Some(record.category),
            exported_at: Some(now),
        }
    }
}

pub fn export_json(records: &[CredentialRecord], now: i64) -> Result<String, AppError> {
    let entries: Vec<ExportedCredential> = records
        .iter()
        .map(|r| ExportedCredential::from_record(r, now))
        .collect();
    serde_json::to_string_pretty(&entries)
        .map_err(|e| AppError::BadRequest(format!("Failed to serialize export: {e}")))
}

pub fn export_csv(records: &[CredentialRecord], now: i64) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for record in records {
        let category = match serde_json::to_value(record.category) {
            Ok(serde_json::Value::String(s)) => s,
            _ => String::new(),
        };
        let row = [
            record.website.as_str(),
            record.url.as_deref().unwrap_or_default(),
            record.username.as_str(),
            record.password.as_str(),
            record.notes.as_deref().unwrap_or_default(),
            category.as_str(),
            &now.to_string(),
        ]
        .iter()
        .map(|field| escape_csv(field))
        .collect::<Vec<_>>()
        .join(",");
        csv.push_str(&row);
        csv.push('\n');
    }
    csv
}

/// Parse an import document into rows. Structural failure (bad JSON, bad or
/// missing header) aborts; row content is validated by the caller.
pub fn parse_import(data: &str, format: ExportFormat) -> Result<Vec<ExportedCredential>, AppError> {
    match format {
        ExportFormat::Json => serde_json::from_str(data)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON import: {e}"))),
        ExportFormat::Csv => parse_csv(data),
    }
}

fn parse_csv(data: &str) -> Result<Vec<ExportedCredential>, AppError> {
    let mut lines = data.lines();
    let header_line = lines
        .next()
        .ok_or_else(|| AppError::BadRequest("Empty CSV import".into()))?;
    let headers: Vec<String> = split_csv_line(header_line)
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let website_col = column("website")
        .ok_or_else(|| AppError::BadRequest("CSV import is missing a 'website' column".into()))?;
    let username_col = column("username")
        .ok_or_else(|| AppError::BadRequest("CSV import is missing a 'username' column".into()))?;
    let password_col = column("password")
        .ok_or_else(|| AppError::BadRequest("CSV import is missing a 'password' column".into()))?;
    let url_col = column("url");
    let notes_col = column("notes");
    let category_col = column("category");

    let mut rows = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        let get = |idx: Option<usize>| -> Option<String> {
            idx.and_then(|i| fields.get(i))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let category = get(category_col)
            .and_then(|c| serde_json::from_value(serde_json::Value::String(c)).ok());
        rows.push(ExportedCredential {
            website: get(Some(website_col)).unwrap_or_default(),
            url: get(url_col),
            username: get(Some(username_col)).unwrap_or_default(),
            password: get(Some(password_col)).unwrap_or_default(),
            notes: get(notes_col),
            category,
            exported_at: None,
        });
    }
    Ok(rows)
}

fn escape_csv(field: &str) -> String {
    let needs_quotes = field.contains(',') || field.contains('"') || field.contains('\n');
    let escaped = field.replace('"', "\"\"");
    if needs_quotes {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

/// Split one CSV line, honoring quoted fields and doubled-quote escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes {
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
