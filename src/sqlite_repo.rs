use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::credential::{
    Category, CredentialRecord, ExportEvent, FormBinding, SharedGrant, UsernameType,
};
use crate::models::form_profile::{FormProfile, ProfileField};
use crate::models::metrics::{CredentialMetrics, Metrics};
use crate::repository::{CredentialFilters, CredentialStore};
use crate::util::{now_millis, owner_prefix};

const CREDENTIAL_COLUMNS: &str = "id, owner_id, website, url, url_patterns, domain_only, \
     username, username_type, username_field, password, password_field, password_strength, \
     category, notes, form_data, last_used, use_count, version, device_ids, last_synced, \
     shared_with, export_history, import_source, created_at, updated_at";

const PROFILE_COLUMNS: &str = "id, owner_id, name, website, url, fields, created_at, updated_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Credential as stored: list/struct fields are JSON TEXT columns.
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: String,
    owner_id: String,
    website: String,
    url: Option<String>,
    url_patterns: String,
    domain_only: bool,
    username: String,
    username_type: String,
    username_field: Option<String>,
    password: String,
    password_field: Option<String>,
    password_strength: i64,
    category: String,
    notes: Option<String>,
    form_data: Option<String>,
    last_used: Option<i64>,
    use_count: i64,
    version: i64,
    device_ids: String,
    last_synced: Option<i64>,
    shared_with: String,
    export_history: String,
    import_source: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn decode_json<T: DeserializeOwned>(raw: &str, what: &'static str) -> Result<T, AppError> {
    serde_json::from_str(raw).map_err(|e| {
        AppError::Database(sqlx::Error::Decode(format!("{what}: {e}").into()))
    })
}

fn decode_variant<T: DeserializeOwned>(raw: &str, what: &'static str) -> Result<T, AppError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).map_err(|e| {
        AppError::Database(sqlx::Error::Decode(format!("{what}: {e}").into()))
    })
}

fn encode_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn encode_variant<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

impl CredentialRow {
    fn into_record(self) -> Result<CredentialRecord, AppError> {
        let url_patterns: Vec<String> = decode_json(&self.url_patterns, "url_patterns")?;
        let username_type: UsernameType = decode_variant(&self.username_type, "username_type")?;
        let category: Category = decode_variant(&self.category, "category")?;
        let form_data: Option<FormBinding> = match self.form_data.as_deref() {
            Some(raw) => Some(decode_json(raw, "form_data")?),
            None => None,
        };
        let device_ids: Vec<String> = decode_json(&self.device_ids, "device_ids")?;
        let shared_with: Vec<SharedGrant> = decode_json(&self.shared_with, "shared_with")?;
        let export_history: Vec<ExportEvent> = decode_json(&self.export_history, "export_history")?;

        Ok(CredentialRecord {
            id: self.id,
            owner_id: self.owner_id,
            website: self.website,
            url: self.url,
            url_patterns,
            domain_only: self.domain_only,
            username: self.username,
            username_type,
            username_field: self.username_field,
            password: self.password,
            password_field: self.password_field,
            password_strength: self.password_strength,
            category,
            notes: self.notes,
            form_data,
            last_used: self.last_used,
            use_count: self.use_count,
            version: self.version,
            device_ids,
            last_synced: self.last_synced,
            is_shared: !shared_with.is_empty(),
            shared_with,
            export_history,
            import_source: self.import_source,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FormProfileRow {
    id: String,
    owner_id: String,
    name: String,
    website: Option<String>,
    url: Option<String>,
    fields: String,
    created_at: i64,
    updated_at: i64,
}

impl FormProfileRow {
    fn into_profile(self) -> Result<FormProfile, AppError> {
        let fields: Vec<ProfileField> = decode_json(&self.fields, "fields")?;
        Ok(FormProfile {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            website: self.website,
            url: self.url,
            fields,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn find_by_id(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<CredentialRecord>, AppError> {
        tracing::debug!(owner = %owner_prefix(owner_id), credential_id = %id, "db: SELECT credential by id");

        let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE owner_id = ? AND id = ?");
        let row: Option<CredentialRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        tracing::debug!(credential_id = %id, found = row.is_some(), "db: lookup result");
        row.map(CredentialRow::into_record).transpose()
    }

    async fn find_by_owner(
        &self,
        owner_id: &str,
        filters: &CredentialFilters,
    ) -> Result<Vec<CredentialRecord>, AppError> {
        tracing::debug!(
            owner = %owner_prefix(owner_id),
            category = ?filters.category,
            site = ?filters.site,
            "db: SELECT credentials for owner"
        );

        let mut sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE owner_id = ?");
        if filters.category.is_some() {
            sql.push_str(" AND category = ?");
        }
        if filters.site.is_some() {
            sql.push_str(" AND (LOWER(website) LIKE ? OR LOWER(COALESCE(url, '')) LIKE ?)");
        }
        sql.push_str(" ORDER BY updated_at DESC");

        let mut query = sqlx::query_as::<_, CredentialRow>(&sql).bind(owner_id);
        if let Some(category) = &filters.category {
            query = query.bind(category.to_lowercase());
        }
        if let Some(site) = &filters.site {
            let pattern = format!("%{}%", site.to_lowercase());
            query = query.bind(pattern.clone()).bind(pattern);
        }

        let rows = query.fetch_all(&self.pool).await?;
        tracing::debug!(owner = %owner_prefix(owner_id), rows_returned = rows.len(), "db: credentials fetched");

        rows.into_iter().map(CredentialRow::into_record).collect()
    }

    async fn find_similar(
        &self,
        owner_id: &str,
        website: &str,
        username: &str,
    ) -> Result<Option<CredentialRecord>, AppError> {
        tracing::debug!(
            owner = %owner_prefix(owner_id),
            website = %website,
            "db: SELECT credential by website+username identity"
        );

        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials \
             WHERE owner_id = ? AND website = ? AND username = ? LIMIT 1"
        );
        let row: Option<CredentialRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .bind(website)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CredentialRow::into_record).transpose()
    }

    async fn find_shared_with(&self, owner_id: &str) -> Result<Vec<CredentialRecord>, AppError> {
        tracing::debug!(owner = %owner_prefix(owner_id), "db: SELECT credentials shared with owner");

        // Coarse SQL pre-filter over the JSON column; the precise grant check
        // happens on the decoded records.
        let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE shared_with LIKE ?");
        let rows: Vec<CredentialRow> = sqlx::query_as(&sql)
            .bind(format!("%\"{owner_id}\"%"))
            .fetch_all(&self.pool)
            .await?;

        let mut shared = Vec::new();
        for row in rows {
            let record = row.into_record()?;
            if record.shared_with.iter().any(|g| g.user_id == owner_id) {
                shared.push(record);
            }
        }
        Ok(shared)
    }

    async fn changed_since(
        &self,
        owner_id: &str,
        since: i64,
    ) -> Result<Vec<CredentialRecord>, AppError> {
        tracing::debug!(owner = %owner_prefix(owner_id), since, "db: SELECT credentials changed since");

        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials \
             WHERE owner_id = ? AND updated_at > ? ORDER BY updated_at DESC"
        );
        let rows: Vec<CredentialRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(owner = %owner_prefix(owner_id), rows_returned = rows.len(), "db: changed credentials fetched");
        rows.into_iter().map(CredentialRow::into_record).collect()
    }

    async fn insert(&self, record: &CredentialRecord) -> Result<(), AppError> {
        tracing::debug!(
            owner = %owner_prefix(&record.owner_id),
            credential_id = %record.id,
            "db: INSERT credential"
        );

        sqlx::query(
            "INSERT INTO credentials (id, owner_id, website, url, url_patterns, domain_only, \
             username, username_type, username_field, password, password_field, password_strength, \
             category, notes, form_data, last_used, use_count, version, device_ids, last_synced, \
             shared_with, export_history, import_source, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.website)
        .bind(&record.url)
        .bind(encode_json(&record.url_patterns))
        .bind(record.domain_only)
        .bind(&record.username)
        .bind(encode_variant(&record.username_type))
        .bind(&record.username_field)
        .bind(&record.password)
        .bind(&record.password_field)
        .bind(record.password_strength)
        .bind(encode_variant(&record.category))
        .bind(&record.notes)
        .bind(record.form_data.as_ref().map(encode_json))
        .bind(record.last_used)
        .bind(record.use_count)
        .bind(record.version)
        .bind(encode_json(&record.device_ids))
        .bind(record.last_synced)
        .bind(encode_json(&record.shared_with))
        .bind(encode_json(&record.export_history))
        .bind(&record.import_source)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn persist(&self, record: &CredentialRecord) -> Result<(), AppError> {
        tracing::debug!(
            owner = %owner_prefix(&record.owner_id),
            credential_id = %record.id,
            version = record.version,
            "db: UPDATE credential"
        );

        let result = sqlx::query(
            "UPDATE credentials SET website = ?, url = ?, url_patterns = ?, domain_only = ?, \
             username = ?, username_type = ?, username_field = ?, password = ?, password_field = ?, \
             password_strength = ?, category = ?, notes = ?, form_data = ?, last_used = ?, \
             use_count = ?, version = ?, device_ids = ?, last_synced = ?, shared_with = ?, \
             export_history = ?, import_source = ?, updated_at = ? \
             WHERE id = ? AND owner_id = ?",
        )
        .bind(&record.website)
        .bind(&record.url)
        .bind(encode_json(&record.url_patterns))
        .bind(record.domain_only)
        .bind(&record.username)
        .bind(encode_variant(&record.username_type))
        .bind(&record.username_field)
        .bind(&record.password)
        .bind(&record.password_field)
        .bind(record.password_strength)
        .bind(encode_variant(&record.category))
        .bind(&record.notes)
        .bind(record.form_data.as_ref().map(encode_json))
        .bind(record.last_used)
        .bind(record.use_count)
        .bind(record.version)
        .bind(encode_json(&record.device_ids))
        .bind(record.last_synced)
        .bind(encode_json(&record.shared_with))
        .bind(encode_json(&record.export_history))
        .bind(&record.import_source)
        .bind(record.updated_at)
        .bind(&record.id)
        .bind(&record.owner_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Credential not found".into()));
        }
        Ok(())
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<(), AppError> {
        tracing::debug!(owner = %owner_prefix(owner_id), credential_id = %id, "db: DELETE credential");

        let result = sqlx::query("DELETE FROM credentials WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Credential not found".into()));
        }
        Ok(())
    }

    async fn insert_form_profile(&self, profile: &FormProfile) -> Result<(), AppError> {
        tracing::debug!(
            owner = %owner_prefix(&profile.owner_id),
            profile_id = %profile.id,
            "db: INSERT form profile"
        );

        sqlx::query(
            "INSERT INTO form_profiles (id, owner_id, name, website, url, fields, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&profile.id)
        .bind(&profile.owner_id)
        .bind(&profile.name)
        .bind(&profile.website)
        .bind(&profile.url)
        .bind(encode_json(&profile.fields))
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_form_profiles(
        &self,
        owner_id: &str,
        site: Option<&str>,
    ) -> Result<Vec<FormProfile>, AppError> {
        tracing::debug!(owner = %owner_prefix(owner_id), site = ?site, "db: SELECT form profiles");

        let mut sql = format!("SELECT {PROFILE_COLUMNS} FROM form_profiles WHERE owner_id = ?");
        if site.is_some() {
            sql.push_str(" AND (LOWER(COALESCE(website, '')) LIKE ? OR LOWER(COALESCE(url, '')) LIKE ?)");
        }
        sql.push_str(" ORDER BY updated_at DESC");

        let mut query = sqlx::query_as::<_, FormProfileRow>(&sql).bind(owner_id);
        if let Some(site) = site {
            let pattern = format!("%{}%", site.to_lowercase());
            query = query.bind(pattern.clone()).bind(pattern);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(FormProfileRow::into_profile).collect()
    }

    async fn find_form_profile(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<FormProfile>, AppError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM form_profiles WHERE owner_id = ? AND id = ?");
        let row: Option<FormProfileRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(FormProfileRow::into_profile).transpose()
    }

    async fn persist_form_profile(&self, profile: &FormProfile) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE form_profiles SET name = ?, website = ?, url = ?, fields = ?, updated_at = ? \
             WHERE id = ? AND owner_id = ?",
        )
        .bind(&profile.name)
        .bind(&profile.website)
        .bind(&profile.url)
        .bind(encode_json(&profile.fields))
        .bind(profile.updated_at)
        .bind(&profile.id)
        .bind(&profile.owner_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Form profile not found".into()));
        }
        Ok(())
    }

    async fn delete_form_profile(&self, owner_id: &str, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM form_profiles WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Form profile not found".into()));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_metrics(&self) -> Result<Metrics, AppError> {
        tracing::debug!("db: collecting metrics");

        let counts: (i64, i64, Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(DISTINCT owner_id), \
             SUM(CASE WHEN shared_with != '[]' THEN 1 ELSE 0 END), \
             SUM(CASE WHEN password_strength < 50 THEN 1 ELSE 0 END) \
             FROM credentials",
        )
        .fetch_one(&self.pool)
        .await?;

        let average: (Option<f64>,) =
            sqlx::query_as("SELECT AVG(password_strength) FROM credentials")
                .fetch_one(&self.pool)
                .await?;

        let form_profiles: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM form_profiles")
            .fetch_one(&self.pool)
            .await?;

        Ok(Metrics {
            credentials: CredentialMetrics {
                total: counts.0,
                owners: counts.1,
                shared: counts.2.unwrap_or(0),
                weak: counts.3.unwrap_or(0),
                average_strength: average.0.unwrap_or(0.0),
            },
            form_profiles: form_profiles.0,
            collected_at: now_millis(),
        })
    }
}
