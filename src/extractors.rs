use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::data_sources::DataSources;
use crate::state::AppState;

/// Value of cookie `name`, if present.
pub fn cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let (key, val) = cookie.split_once('=')?;
            (key.trim() == name).then(|| val.trim())
        })
}

/// Session token from `Authorization: Bearer`, falling back to the session cookie.
pub fn session_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer
        .or_else(|| cookie_value(parts, cookie_name))
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Per-request data sources with the viewer resolved. Never rejects: an
/// invalid token just means an anonymous viewer.
impl FromRequestParts<AppState> for DataSources {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts, &state.config.auth.cookie_name);
        Ok(DataSources::for_request(state.db.clone(), state.services.clone(), token).await)
    }
}
