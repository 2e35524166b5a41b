pub mod credential;
pub mod form_profile;
pub mod metrics;
pub mod sync;
