use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Gate `/admin/*` behind the `ADMIN_TOKEN` environment variable.
///
/// - `ADMIN_TOKEN` unset or empty: respond 404 and keep the endpoint hidden.
/// - Token missing or wrong: 401.
pub async fn require_admin_token(req: Request, next: Next) -> Response {
    let expected = match std::env::var("ADMIN_TOKEN") {
        Ok(t) if !t.is_empty() => t,
        _ => {
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected => next.run(req).await,
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}
