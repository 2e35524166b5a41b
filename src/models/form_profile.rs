use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// One saved form field. Sensitive values are encrypted at the storage
/// boundary, like passwords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileField {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
}

/// A reusable non-login form profile (shipping address, billing info, ...).
/// Plain CRUD: no versioning, no sync protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormProfile {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub website: Option<String>,
    pub url: Option<String>,
    pub fields: Vec<ProfileField>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewFormProfile {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub fields: Vec<ProfileField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFormProfile {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub fields: Vec<ProfileField>,
}

impl FormProfile {
    pub fn create(owner_id: &str, new: NewFormProfile, now: i64) -> Result<Self, AppError> {
        if new.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name",
                message: "name is required".into(),
            });
        }
        Ok(FormProfile {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: new.name,
            website: new.website,
            url: new.url,
            fields: new.fields,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply_update(&mut self, update: UpdateFormProfile, now: i64) -> Result<(), AppError> {
        if update.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name",
                message: "name is required".into(),
            });
        }
        self.name = update.name;
        self.website = update.website;
        self.url = update.url;
        self.fields = update.fields;
        self.updated_at = now;
        Ok(())
    }
}
