use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use credvault_sync::middleware::rate_limit::RateLimiter;
use credvault_sync::sqlite_repo::SqliteStore;
use credvault_sync::{build_app, db, AppState};

// -- Helpers ------------------------------------------------------------------

async fn setup_app() -> axum::Router {
    let pool = db::init_pool("sqlite::memory:").await.unwrap();
    let state = AppState {
        store: Arc::new(SqliteStore::new(pool)),
        rate_limiter: RateLimiter::new(1000, 60),
        max_sync_batch: 500,
    };
    build_app(state)
}

async fn send_request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    owner: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let has_body = body.is_some();
    let body_str = body.map(|b| b.to_string()).unwrap_or_default();
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(owner) = owner {
        builder = builder.header("authorization", format!("Bearer {owner}"));
    }
    if has_body {
        builder = builder.header("content-type", "application/json");
    }

    let req = builder.body(Body::from(body_str)).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn json_request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    owner: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = send_request(app, method, uri, owner, body).await;
    let value: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_credential(app: &axum::Router, owner: &str, body: Value) -> Value {
    let (status, created) =
        json_request(app, "POST", "/api/v1/credentials", Some(owner), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    created
}

// -- Credential CRUD ----------------------------------------------------------

#[tokio::test]
async fn test_create_and_fetch_credential() {
    let app = setup_app().await;
    let created = create_credential(
        &app,
        "owner-1",
        json!({
            "website": "example.com",
            "url": "https://login.example.com/session",
            "username": "a@x.com",
            "password": "Tr0ub4dor&horse!",
            "category": "work",
        }),
    )
    .await;

    assert_eq!(created["version"], 1);
    assert_eq!(created["useCount"], 0);
    assert_eq!(created["category"], "work");
    assert_eq!(created["passwordStrength"], 90);
    // Patterns derived from the URL's registrable domain.
    assert_eq!(created["urlPatterns"][0], "*.example.com");

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = json_request(
        &app,
        "GET",
        &format!("/api/v1/credentials/{id}"),
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["website"], "example.com");
}

#[tokio::test]
async fn test_create_with_empty_password_rejected_and_not_persisted() {
    let app = setup_app().await;
    let (status, body) = json_request(
        &app,
        "POST",
        "/api/v1/credentials",
        Some("owner-1"),
        Some(json!({
            "website": "example.com",
            "username": "a@x.com",
            "password": "",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "password");

    let (_, all) = json_request(&app, "GET", "/api/v1/credentials", Some("owner-1"), None).await;
    assert_eq!(all.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_update_bumps_version_and_recomputes_strength() {
    let app = setup_app().await;
    let created = create_credential(
        &app,
        "owner-1",
        json!({
            "website": "example.com",
            "username": "a@x.com",
            "password": "Abc12345!",
        }),
    )
    .await;
    let id = created["id"].as_str().unwrap();
    let old_strength = created["passwordStrength"].as_i64().unwrap();

    let (status, updated) = json_request(
        &app,
        "PUT",
        &format!("/api/v1/credentials/{id}"),
        Some("owner-1"),
        Some(json!({
            "website": "example.com",
            "username": "a@x.com",
            "password": "zz",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["version"], 2);
    assert_ne!(updated["passwordStrength"].as_i64().unwrap(), old_strength);
}

#[tokio::test]
async fn test_delete_credential() {
    let app = setup_app().await;
    let created = create_credential(
        &app,
        "owner-1",
        json!({ "website": "example.com", "username": "u", "password": "Abc12345!" }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = json_request(
        &app,
        "DELETE",
        &format!("/api/v1/credentials/{id}"),
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = json_request(
        &app,
        "GET",
        &format!("/api/v1/credentials/{id}"),
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_site_listing_filters_by_domain() {
    let app = setup_app().await;
    create_credential(
        &app,
        "owner-1",
        json!({ "website": "example.com", "username": "u", "password": "Abc12345!" }),
    )
    .await;
    create_credential(
        &app,
        "owner-1",
        json!({ "website": "other.net", "username": "u", "password": "Abc12345!" }),
    )
    .await;

    let (status, body) = json_request(
        &app,
        "GET",
        "/api/v1/credentials/site/example.com",
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["website"], "example.com");
}

#[tokio::test]
async fn test_strength_endpoint_reports_suggestions() {
    let app = setup_app().await;
    let created = create_credential(
        &app,
        "owner-1",
        json!({ "website": "example.com", "username": "u", "password": "abcdefgh" }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = json_request(
        &app,
        "GET",
        &format!("/api/v1/credentials/{id}/strength"),
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["passwordStrength"].as_i64().unwrap() < 50);
    assert!(!body["suggestions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_share_and_list_shared() {
    let app = setup_app().await;
    let created = create_credential(
        &app,
        "owner-1",
        json!({ "website": "example.com", "username": "u", "password": "Abc12345!" }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, shared) = json_request(
        &app,
        "POST",
        &format!("/api/v1/credentials/{id}/share"),
        Some("owner-1"),
        Some(json!({ "targetUserId": "owner-2", "accessLevel": "read" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shared["isShared"], true);

    let (status, visible) = json_request(
        &app,
        "GET",
        "/api/v1/credentials/shared",
        Some("owner-2"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visible.as_array().unwrap().len(), 1);
    assert_eq!(visible[0]["id"].as_str().unwrap(), id);
}

// -- Autofill matching --------------------------------------------------------

#[tokio::test]
async fn test_autofill_requires_url() {
    let app = setup_app().await;
    let (status, body) = json_request(&app, "GET", "/api/v1/autofill", Some("owner-1"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "url");
}

#[tokio::test]
async fn test_autofill_pattern_stage_matches_subdomain() {
    let app = setup_app().await;
    create_credential(
        &app,
        "owner-1",
        json!({
            "website": "Example",
            "urlPatterns": ["*.example.com"],
            "username": "a@x.com",
            "password": "Abc12345!",
        }),
    )
    .await;

    let (status, body) = json_request(
        &app,
        "GET",
        "/api/v1/autofill?url=https://sub.example.com/login",
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["candidates"][0]["website"], "Example");
}

#[tokio::test]
async fn test_autofill_no_candidates_is_empty_list() {
    let app = setup_app().await;
    create_credential(
        &app,
        "owner-1",
        json!({ "website": "example.com", "username": "u", "password": "Abc12345!" }),
    )
    .await;

    let (status, body) = json_request(
        &app,
        "GET",
        "/api/v1/autofill?url=https://unrelated.io/",
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
    assert_eq!(body["candidates"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_autofill_does_not_leak_other_owners() {
    let app = setup_app().await;
    create_credential(
        &app,
        "owner-1",
        json!({ "website": "example.com", "username": "u", "password": "Abc12345!" }),
    )
    .await;

    let (status, body) = json_request(
        &app,
        "GET",
        "/api/v1/autofill?url=https://example.com/",
        Some("owner-2"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_usage_report_updates_stats_and_learns_form() {
    let app = setup_app().await;
    let created = create_credential(
        &app,
        "owner-1",
        json!({ "website": "example.com", "username": "u", "password": "Abc12345!" }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = json_request(
        &app,
        "POST",
        &format!("/api/v1/autofill/usage/{id}"),
        Some("owner-1"),
        Some(json!({
            "formData": {
                "formId": "login-form",
                "usernameField": "session_email",
                "passwordField": "session_password",
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, record) = json_request(
        &app,
        "GET",
        &format!("/api/v1/credentials/{id}"),
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(record["useCount"], 1);
    assert!(record["lastUsed"].as_i64().unwrap() > 0);
    assert_eq!(record["formData"]["formId"], "login-form");
    assert_eq!(record["usernameField"], "session_email");
    assert_eq!(record["usernameType"], "email");
    assert_eq!(record["version"], 2, "learned bindings are version-relevant");

    // A second identical report only moves the cumulative counters.
    json_request(
        &app,
        "POST",
        &format!("/api/v1/autofill/usage/{id}"),
        Some("owner-1"),
        Some(json!({
            "formData": {
                "formId": "login-form",
                "usernameField": "session_email",
                "passwordField": "session_password",
            }
        })),
    )
    .await;
    let (_, record) = json_request(
        &app,
        "GET",
        &format!("/api/v1/credentials/{id}"),
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(record["useCount"], 2);
    assert_eq!(record["version"], 2);

    // The learned form id now wins the first matcher stage.
    let (_, matches) = json_request(
        &app,
        "GET",
        "/api/v1/autofill?url=https://elsewhere.org/&formId=login-form",
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(matches["count"], 1);
}

// -- Export / import ----------------------------------------------------------

#[tokio::test]
async fn test_export_json_round_trips_through_import() {
    let app = setup_app().await;
    create_credential(
        &app,
        "owner-1",
        json!({
            "website": "example.com",
            "url": "https://example.com/login",
            "username": "a@x.com",
            "password": "Abc12345!",
            "notes": "the note",
            "category": "finance",
        }),
    )
    .await;

    let (status, bytes) = send_request(
        &app,
        "GET",
        "/api/v1/credentials/export?format=json",
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let document = String::from_utf8(bytes).unwrap();
    assert!(!document.contains("\"version\""));

    let (status, result) = json_request(
        &app,
        "POST",
        "/api/v1/credentials/import?format=json",
        Some("owner-2"),
        Some(json!({ "data": document })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(result["imported"], 1);
    assert_eq!(result["skipped"], 0);

    let (_, imported) = json_request(&app, "GET", "/api/v1/credentials", Some("owner-2"), None).await;
    let record = &imported.as_array().unwrap()[0];
    assert_eq!(record["website"], "example.com");
    assert_eq!(record["url"], "https://example.com/login");
    assert_eq!(record["username"], "a@x.com");
    assert_eq!(record["password"], "Abc12345!");
    assert_eq!(record["notes"], "the note");
    assert_eq!(record["category"], "finance");
    assert_eq!(record["importSource"], "json");
}

#[tokio::test]
async fn test_export_appends_history() {
    let app = setup_app().await;
    let created = create_credential(
        &app,
        "owner-1",
        json!({ "website": "example.com", "username": "u", "password": "Abc12345!" }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    send_request(
        &app,
        "GET",
        "/api/v1/credentials/export?format=csv",
        Some("owner-1"),
        None,
    )
    .await;

    let (_, record) = json_request(
        &app,
        "GET",
        &format!("/api/v1/credentials/{id}"),
        Some("owner-1"),
        None,
    )
    .await;
    let history = record["exportHistory"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["exportFormat"], "csv");
}

#[tokio::test]
async fn test_export_csv_has_contract_header() {
    let app = setup_app().await;
    create_credential(
        &app,
        "owner-1",
        json!({ "website": "example.com", "username": "u", "password": "Abc12345!" }),
    )
    .await;

    let (status, bytes) = send_request(
        &app,
        "GET",
        "/api/v1/credentials/export?format=csv",
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let document = String::from_utf8(bytes).unwrap();
    assert!(document.starts_with("website,url,username,password,notes,category,exportedAt"));
}

#[tokio::test]
async fn test_export_with_no_records_is_not_found() {
    let app = setup_app().await;
    let (status, _) = send_request(
        &app,
        "GET",
        "/api/v1/credentials/export?format=json",
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_import_rejects_unknown_format_and_bad_document() {
    let app = setup_app().await;

    let (status, _) = json_request(
        &app,
        "POST",
        "/api/v1/credentials/import?format=xml",
        Some("owner-1"),
        Some(json!({ "data": "<xml/>" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = json_request(
        &app,
        "POST",
        "/api/v1/credentials/import?format=json",
        Some("owner-1"),
        Some(json!({ "data": "{not json" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, all) = json_request(&app, "GET", "/api/v1/credentials", Some("owner-1"), None).await;
    assert_eq!(all.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_import_csv_skips_invalid_rows() {
    let app = setup_app().await;
    let csv = "website,username,password\nexample.com,u1,Abc12345!\nmissing-password.com,u2,\n";

    let (status, result) = json_request(
        &app,
        "POST",
        "/api/v1/credentials/import?format=csv",
        Some("owner-1"),
        Some(json!({ "data": csv })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(result["imported"], 1);
    assert_eq!(result["skipped"], 1);
}

// -- Form profiles ------------------------------------------------------------

#[tokio::test]
async fn test_form_profile_crud() {
    let app = setup_app().await;

    let (status, created) = json_request(
        &app,
        "POST",
        "/api/v1/forms",
        Some("owner-1"),
        Some(json!({
            "name": "Shipping",
            "website": "shop.example.com",
            "fields": [
                { "name": "address", "value": "1 Main St", "type": "text", "sensitive": false },
                { "name": "card", "value": "4111", "type": "text", "sensitive": true },
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();

    let (status, updated) = json_request(
        &app,
        "PUT",
        &format!("/api/v1/forms/{id}"),
        Some("owner-1"),
        Some(json!({
            "name": "Shipping (home)",
            "website": "shop.example.com",
            "fields": [{ "name": "address", "value": "2 Oak Ave", "type": "text", "sensitive": false }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Shipping (home)");
    assert_eq!(updated["fields"].as_array().unwrap().len(), 1);

    // Other owners cannot see or delete it.
    let (status, _) = json_request(
        &app,
        "GET",
        &format!("/api/v1/forms/{id}"),
        Some("owner-2"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = json_request(
        &app,
        "DELETE",
        &format!("/api/v1/forms/{id}"),
        Some("owner-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, all) = json_request(&app, "GET", "/api/v1/forms", Some("owner-1"), None).await;
    assert_eq!(all.as_array().unwrap().len(), 0);
}

// -- Health -------------------------------------------------------------------

#[tokio::test]
async fn test_health_check_is_public() {
    let app = setup_app().await;
    let (status, body) = json_request(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
