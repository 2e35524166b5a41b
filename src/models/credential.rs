use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::strength::score_password;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsernameType {
    Email,
    Username,
    Phone,
    Other,
}

impl Default for UsernameType {
    fn default() -> Self {
        UsernameType::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Personal,
    Work,
    Finance,
    Social,
    Other,
}

impl Default for Category {
    fn default() -> Self {
        Category::Personal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

/// An extra input captured alongside the login form (e.g. a "remember me"
/// checkbox or a company-id field).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalField {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
}

/// Learned identity of the form this credential fills.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormBinding {
    pub form_id: Option<String>,
    pub form_action: Option<String>,
    pub additional_fields: Vec<AdditionalField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedGrant {
    pub user_id: String,
    pub access_level: AccessLevel,
    pub shared_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEvent {
    pub exported_at: i64,
    pub export_format: ExportFormat,
}

/// A stored credential, as held by the server and sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    pub owner_id: String,
    pub website: String,
    pub url: Option<String>,
    pub url_patterns: Vec<String>,
    pub domain_only: bool,
    pub username: String,
    pub username_type: UsernameType,
    pub username_field: Option<String>,
    pub password: String,
    pub password_field: Option<String>,
    pub password_strength: i64,
    pub category: Category,
    pub notes: Option<String>,
    pub form_data: Option<FormBinding>,
    pub last_used: Option<i64>,
    pub use_count: i64,
    pub version: i64,
    pub device_ids: Vec<String>,
    pub last_synced: Option<i64>,
    pub is_shared: bool,
    pub shared_with: Vec<SharedGrant>,
    pub export_history: Vec<ExportEvent>,
    pub import_source: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Body of POST /api/v1/credentials.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewCredential {
    pub website: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_patterns: Vec<String>,
    #[serde(default)]
    pub domain_only: bool,
    pub username: String,
    #[serde(default)]
    pub username_type: Option<UsernameType>,
    pub password: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Body of PUT /api/v1/credentials/:id — full-field replace.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCredential {
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
    pub device_id: Option<String>,
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation {
            field,
            message: format!("{field} is required"),
        });
    }
    Ok(())
}

/// Derive a wildcard pattern from a URL's host: keep the last two
/// dot-separated labels (`login.example.com` -> `*.example.com`).
/// Single-label hosts map to themselves.
pub fn derive_url_patterns(url: &str) -> Vec<String> {
    let host = match crate::urlmatch::hostname(url) {
        Some(h) => h,
        None => return Vec::new(),
    };
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() >= 2 {
        let tail = labels[labels.len() - 2..].join(".");
        vec![format!("*.{tail}")]
    } else if labels.len() == 1 {
        vec![labels[0].to_string()]
    } else {
        Vec::new()
    }
}

impl CredentialRecord {
    /// Build a record from a create request. Rejects empty identity fields
    /// before anything reaches the store.
    pub fn create(owner_id: &str, new: NewCredential, now: i64) -> Result<Self, AppError> {
        require_non_empty("website", &new.website)?;
        require_non_empty("username", &new.username)?;
        require_non_empty("password", &new.password)?;

        let url_patterns = if new.url_patterns.is_empty() {
            new.url.as_deref().map(derive_url_patterns).unwrap_or_default()
        } else {
            new.url_patterns
        };

        Ok(CredentialRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            website: new.website,
            url: new.url,
            url_patterns,
            domain_only: new.domain_only,
            username: new.username,
            username_type: new.username_type.unwrap_or_default(),
            username_field: None,
            password_strength: score_password(&new.password),
            password: new.password,
            password_field: None,
            category: new.category.unwrap_or_default(),
            notes: new.notes,
            form_data: None,
            last_used: None,
            use_count: 0,
            version: 1,
            device_ids: new.device_id.into_iter().collect(),
            last_synced: None,
            is_shared: false,
            shared_with: Vec::new(),
            export_history: Vec::new(),
            import_source: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Full-field replace from an update request. Bumps `version` only when a
    /// version-relevant field actually changed, and recomputes
    /// `password_strength` whenever the password changed.
    pub fn apply_update(&mut self, update: UpdateCredential, now: i64) -> Result<(), AppError> {
        require_non_empty("website", &update.website)?;
        require_non_empty("username", &update.username)?;
        require_non_empty("password", &update.password)?;

        let changed = self.website != update.website
            || self.url != update.url
            || self.username != update.username
            || self.password != update.password;

        if self.password != update.password {
            self.password_strength = score_password(&update.password);
        }
        if self.url_patterns.is_empty() {
            if let Some(url) = update.url.as_deref() {
                self.url_patterns = derive_url_patterns(url);
            }
        }

        self.website = update.website;
        self.url = update.url;
        self.username = update.username;
        self.password = update.password;
        self.notes = update.notes;
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(device_id) = update.device_id {
            self.touch_device(&device_id);
        }

        if changed {
            self.version += 1;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Register a device as having seen this record.
    pub fn touch_device(&mut self, device_id: &str) {
        if !self.device_ids.iter().any(|d| d == device_id) {
            self.device_ids.push(device_id.to_string());
        }
    }

    pub fn share_with(&mut self, user_id: &str, access_level: AccessLevel, now: i64) {
        if let Some(grant) = self.shared_with.iter_mut().find(|g| g.user_id == user_id) {
            grant.access_level = access_level;
        } else {
            self.shared_with.push(SharedGrant {
                user_id: user_id.to_string(),
                access_level,
                shared_at: now,
            });
        }
        self.is_shared = !self.shared_with.is_empty();
    }

    pub fn note_export(&mut self, format: ExportFormat, now: i64) {
        self.export_history.push(ExportEvent {
            exported_at: now,
            export_format: format,
        });
    }
}
