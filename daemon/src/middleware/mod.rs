pub mod auth;

pub use auth::{require_json, BearerToken, TOKEN_HEADER};
