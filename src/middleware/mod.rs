pub mod admin_auth;
pub mod auth;
pub mod rate_limit;
