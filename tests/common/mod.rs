#![allow(dead_code)]

use std::sync::Arc;

use agora::auth::{SocialAccountType, SocialProfile, SocialProvider, TokenKeys, UserAgent};
use agora::config::Config;
use agora::data_sources::{DataSources, RequestContext, Services};
use agora::db::{self, models::User, DbPool};
use agora::error::{AppError, AppResult};
use agora::state::AppState;
use async_trait::async_trait;
use tempfile::TempDir;

/// Accepts `valid:<profile id>` (verified email) and `unverified:<profile id>:<email>`.
pub struct StubSocialProvider;

#[async_trait]
impl SocialProvider for StubSocialProvider {
    async fn verify(&self, _kind: SocialAccountType, token: &str) -> AppResult<SocialProfile> {
        if let Some(rest) = token.strip_prefix("unverified:") {
            let (id, email) = rest.split_once(':').unwrap_or((rest, ""));
            return Ok(SocialProfile {
                id: id.to_string(),
                email: Some(email.to_string()),
                email_verified: false,
                display_name: None,
                thumbnail_url: None,
            });
        }
        let id = token
            .strip_prefix("valid:")
            .ok_or_else(|| AppError::Unauthenticated("Invalid social account token".into()))?;
        Ok(SocialProfile {
            id: id.to_string(),
            email: Some(format!("{}@social.example", id)),
            email_verified: true,
            display_name: Some(format!("Social {}", id)),
            thumbnail_url: None,
        })
    }
}

pub fn setup_db() -> (TempDir, DbPool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("test.db")).expect("create pool");
    db::run_migrations(&pool).expect("run migrations");
    (temp_dir, pool)
}

pub fn services() -> Services {
    Services {
        tokens: TokenKeys::new("integration-secret", 1),
        social: Arc::new(StubSocialProvider),
    }
}

pub fn test_state(pool: &DbPool) -> AppState {
    let mut config = Config::default();
    config.auth.token_secret = "integration-secret".to_string();
    AppState::new(pool.clone(), config, services())
}

pub fn insert_user(pool: &DbPool, id: &str, name: &str) -> User {
    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO users (id, display_name, email) VALUES (?1, ?2, ?3)",
        rusqlite::params![id, name, format!("{}@example.com", id)],
    )
    .unwrap();
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        [id],
        User::from_row,
    )
    .unwrap()
}

/// Issue a session token for `user`, as a login would.
pub async fn sign_in(pool: &DbPool, user: &User) -> String {
    DataSources::new(pool.clone(), services(), RequestContext::default())
        .auth_tokens
        .sign_and_save_token(&UserAgent::default(), user)
        .await
        .unwrap()
}

/// Run a GraphQL document as the holder of `token`.
pub async fn execute(
    pool: &DbPool,
    token: Option<&str>,
    query: &str,
) -> async_graphql::Response {
    let schema = agora::graphql::build_schema();
    let data_sources =
        DataSources::for_request(pool.clone(), services(), token.map(String::from)).await;
    schema
        .execute(async_graphql::Request::new(query).data(data_sources))
        .await
}

pub fn error_code(response: &async_graphql::Response) -> Option<String> {
    let err = response.errors.first()?;
    let value = err.extensions.as_ref()?.get("code")?;
    match value {
        async_graphql::Value::String(code) => Some(code.clone()),
        _ => None,
    }
}
