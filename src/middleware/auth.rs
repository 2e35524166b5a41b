use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Extract the owner identity from the `Authorization: Bearer <token>` header.
/// Token issuance and verification belong to the auth collaborator; this
/// middleware checks shape only and then trusts the value as the owner id.
pub async fn require_owner(mut req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().path().to_string();

    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    match token {
        Some(t) if is_valid_owner_token(&t) => {
            tracing::debug!(
                owner = %crate::util::owner_prefix(&t),
                method = %method,
                uri = %uri,
                "Auth middleware: owner token valid, forwarding to handler"
            );
            req.extensions_mut().insert(OwnerId(t));
            next.run(req).await
        }
        Some(_) => {
            tracing::warn!(
                method = %method,
                uri = %uri,
                "Auth middleware: rejected — malformed bearer token"
            );
            (StatusCode::BAD_REQUEST, "Invalid bearer token format").into_response()
        }
        None => {
            tracing::warn!(
                method = %method,
                uri = %uri,
                "Auth middleware: rejected — missing Authorization header"
            );
            (StatusCode::UNAUTHORIZED, "Missing Authorization: Bearer header").into_response()
        }
    }
}

/// The trusted owner identity for the current request.
#[derive(Debug, Clone)]
pub struct OwnerId(pub String);

/// Owner tokens are opaque: non-empty, at most 128 visible ASCII characters.
pub fn is_valid_owner_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= 128
        && token.chars().all(|c| c.is_ascii_graphic())
}
