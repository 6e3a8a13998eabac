//! Minimal cookie helpers for the beta feature flags.

use axum::http::{header, HeaderMap, HeaderValue};

use common::errors::{AppError, AppResult};

/// Cookie selecting the beta builder UI.
pub const DESIGN_UI_COOKIE: &str = "beta:design_ui";

/// Name of the toggle cookie for a beta feature.
pub fn beta_cookie_name(feature: &str) -> String {
    format!("beta:{}", feature)
}

/// Value of the named cookie, if the request carries a non-empty one.
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value enabling a flag.
pub fn set_cookie(name: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&format!("{}=1; Path=/; HttpOnly; SameSite=Lax", name))
        .map_err(|e| AppError::BadRequest(format!("invalid cookie name {}: {}", name, e)))
}

/// `Set-Cookie` value removing a flag.
pub fn clear_cookie(name: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", name))
        .map_err(|e| AppError::BadRequest(format!("invalid cookie name {}: {}", name, e)))
}
