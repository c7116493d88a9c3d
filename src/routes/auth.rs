use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{SocialAccountType, UserAgent};
use crate::data_sources::DataSources;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
}

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name,
        token,
        max_age_hours * 3600
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

/// POST /auth/login/{provider}: exchange a provider token for a session token
async fn login(
    State(state): State<AppState>,
    data_sources: DataSources,
    headers: HeaderMap,
    Path(provider): Path<String>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Response> {
    let kind = SocialAccountType::from_slug(&provider)
        .ok_or_else(|| AppError::NotFound(format!("Unknown login provider: {}", provider)))?;

    let profile = state.services.social.verify(kind, body.token.trim()).await?;
    let user = data_sources
        .users
        .find_or_create_by_social(kind, &profile)
        .await?;
    let token = data_sources
        .auth_tokens
        .sign_and_save_token(&UserAgent::from_headers(&headers), &user)
        .await?;

    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.token_hours,
    );
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            token,
            user_id: user.id,
        }),
    )
        .into_response())
}

/// POST /auth/logout: revoke the calling session and clear the cookie
async fn logout(State(state): State<AppState>, data_sources: DataSources) -> AppResult<Response> {
    data_sources.auth_tokens.delete_current().await?;
    Ok((
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )],
    )
        .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login/{provider}", post(login))
        .route("/auth/logout", post(logout))
}
