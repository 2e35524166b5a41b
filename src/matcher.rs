//! Autofill candidate selection.
//!
//! A match request describes the page a content script is looking at: its URL
//! and, when a form was detected, the form's identity and input field names.
//! Matching walks a cascade from the most specific signal (a learned form id)
//! down to bare domain comparison; the first stage that yields at least one
//! candidate wins and later stages are never consulted.

use serde::{Deserialize, Serialize};

use crate::models::credential::CredentialRecord;
use crate::urlmatch::{self, hostname, strip_www};

/// A page/form to find credentials for.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchQuery {
    pub url: String,
    pub form_id: Option<String>,
    pub form_action: Option<String>,
    pub input_fields: Vec<InputField>,
}

/// One input element observed in the candidate form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputField {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
}

/// Rank candidates most relevant first, then walk the cascade.
/// An empty result is a normal outcome, not an error.
pub fn find_candidates(mut records: Vec<CredentialRecord>, query: &MatchQuery) -> Vec<CredentialRecord> {
    // Most recently and most frequently used first; never-used records last.
    records.sort_by(|a, b| {
        b.last_used
            .cmp(&a.last_used)
            .then(b.use_count.cmp(&a.use_count))
    });

    for stage in [
        Stage::FormId,
        Stage::FormAction,
        Stage::FieldNames,
        Stage::Url,
        Stage::Domain,
    ] {
        let hits: Vec<CredentialRecord> = records
            .iter()
            .filter(|r| stage.accepts(r, query))
            .cloned()
            .collect();
        if !hits.is_empty() {
            return hits;
        }
    }
    Vec::new()
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    FormId,
    FormAction,
    FieldNames,
    Url,
    Domain,
}

impl Stage {
    fn accepts(self, record: &CredentialRecord, query: &MatchQuery) -> bool {
        match self {
            Stage::FormId => {
                let Some(form_id) = non_empty(query.form_id.as_deref()) else {
                    return false;
                };
                record
                    .form_data
                    .as_ref()
                    .and_then(|f| f.form_id.as_deref())
                    .map(|stored| stored == form_id)
                    .unwrap_or(false)
            }
            Stage::FormAction => {
                let Some(form_action) = non_empty(query.form_action.as_deref()) else {
                    return false;
                };
                record
                    .form_data
                    .as_ref()
                    .and_then(|f| f.form_action.as_deref())
                    .map(|stored| stored == form_action)
                    .unwrap_or(false)
            }
            Stage::FieldNames => {
                if query.input_fields.is_empty() {
                    return false;
                }
                let known = [record.username_field.as_deref(), record.password_field.as_deref()];
                query.input_fields.iter().any(|field| {
                    [field.name.as_deref(), field.id.as_deref()]
                        .into_iter()
                        .flatten()
                        .filter(|n| !n.is_empty())
                        .any(|n| known.iter().flatten().any(|k| *k == n))
                })
            }
            Stage::Url => {
                let host = hostname(&query.url);
                let exact = record
                    .url
                    .as_deref()
                    .map(|u| u == query.url)
                    .unwrap_or(false);
                exact
                    || record
                        .url_patterns
                        .iter()
                        .any(|p| pattern_hit(p, &query.url, host.as_deref()))
                    || host
                        .as_deref()
                        .map(|h| record.website.eq_ignore_ascii_case(h))
                        .unwrap_or(false)
            }
            Stage::Domain => match hostname(&query.url) {
                Some(host) => {
                    record.website.eq_ignore_ascii_case(&host)
                        || record
                            .website
                            .eq_ignore_ascii_case(strip_www(&host))
                        || strip_www(&record.website.to_ascii_lowercase())
                            .eq_ignore_ascii_case(strip_www(&host))
                        || (record.domain_only
                            && record
                                .url
                                .as_deref()
                                .map(|u| u.to_ascii_lowercase().contains(host.as_str()))
                                .unwrap_or(false))
                }
                // URL parsing failed everywhere: substring containment keeps
                // the request answerable instead of erroring out.
                None => record
                    .url
                    .as_deref()
                    .map(|u| !u.is_empty() && !query.url.is_empty() && (u.contains(&query.url) || query.url.contains(u)))
                    .unwrap_or(false),
            },
        }
    }
}

fn pattern_hit(pattern: &str, url: &str, host: Option<&str>) -> bool {
    urlmatch::glob_matches(pattern, url) || host.map(|h| urlmatch::glob_matches(pattern, h)).unwrap_or(false)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
