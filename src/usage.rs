//! Autofill usage feedback.
//!
//! After a successful fill the extension reports which form the credential
//! went into. Scalar form identity is last-write-wins; additional fields are
//! merged by name so a later fill never clobbers values learned earlier.

use serde::Deserialize;

use crate::models::credential::{AdditionalField, CredentialRecord, FormBinding, UsernameType};

/// Form observation sent with a usage report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormObservation {
    pub form_id: Option<String>,
    pub form_action: Option<String>,
    pub username_field: Option<String>,
    pub password_field: Option<String>,
    pub additional_fields: Vec<AdditionalField>,
}

/// Merge a form observation into the record. Returns true when anything
/// version-relevant (form binding or learned field names) changed.
pub fn merge_form_data(record: &mut CredentialRecord, observed: &FormObservation) -> bool {
    let mut changed = false;
    let binding = record.form_data.get_or_insert_with(FormBinding::default);

    if let Some(form_id) = non_empty(&observed.form_id) {
        if binding.form_id.as_deref() != Some(form_id) {
            binding.form_id = Some(form_id.to_string());
            changed = true;
        }
    }
    if let Some(form_action) = non_empty(&observed.form_action) {
        if binding.form_action.as_deref() != Some(form_action) {
            binding.form_action = Some(form_action.to_string());
            changed = true;
        }
    }

    // Append-only by field name; existing entries are left untouched.
    for field in &observed.additional_fields {
        if field.name.is_empty() {
            continue;
        }
        if !binding.additional_fields.iter().any(|f| f.name == field.name) {
            binding.additional_fields.push(field.clone());
            changed = true;
        }
    }

    if let Some(username_field) = non_empty(&observed.username_field) {
        if record.username_field.as_deref() != Some(username_field) {
            record.username_field = Some(username_field.to_string());
            changed = true;
        }
        record.username_type = infer_username_type(username_field, record.username_type);
    }
    if let Some(password_field) = non_empty(&observed.password_field) {
        if record.password_field.as_deref() != Some(password_field) {
            record.password_field = Some(password_field.to_string());
            changed = true;
        }
    }

    changed
}

/// Guess the username kind from the input's name; keeps the current value
/// when the name carries no signal.
pub fn infer_username_type(field_name: &str, current: UsernameType) -> UsernameType {
    let lowered = field_name.to_ascii_lowercase();
    if lowered.contains("email") {
        UsernameType::Email
    } else if lowered.contains("phone") {
        UsernameType::Phone
    } else if lowered.contains("user") {
        UsernameType::Username
    } else {
        current
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
