use rusqlite::params;
use rusqlite::types::Value;

use super::{Base, NOT_ALLOWED, NOT_LOGGED_IN};
use crate::auth::{Claims, UserAgent};
use crate::db::models::{AuthToken, User};
use crate::db::pagination::{self, ConnectionArgs, ConnectionQuery, OrderDirection, Page};
use crate::db::{new_id, now_timestamp, parse_timestamp};
use crate::error::{AppError, AppResult};

const NOT_YOUR_SESSION: &str = "Not allowed to delete another users session.";

/// Metadata persisted for a freshly issued token.
#[derive(Debug, Clone)]
pub struct NewAuthToken {
    pub jti: String,
    pub user_id: String,
    pub browser: Option<String>,
    pub platform: Option<String>,
    pub os: Option<String>,
}

/// Login sessions: one row per issued JWT.
#[derive(Clone)]
pub struct AuthTokenRepository {
    base: Base,
}

impl AuthTokenRepository {
    pub(crate) fn new(base: Base) -> Self {
        Self { base }
    }

    pub async fn create(&self, input: NewAuthToken) -> AppResult<AuthToken> {
        let id = new_id();
        let created_at = now_timestamp();
        let conn = self.base.pool.get()?;
        conn.execute(
            "INSERT INTO auth_tokens (id, jti, user_id, browser, platform, os, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                input.jti,
                input.user_id,
                input.browser,
                input.platform,
                input.os,
                created_at
            ],
        )?;

        Ok(AuthToken {
            id,
            jti: input.jti,
            user_id: input.user_id,
            browser: input.browser,
            platform: input.platform,
            os: input.os,
            created_at: parse_timestamp(&created_at),
            is_current: false,
        })
    }

    pub async fn find_one_by_jti(&self, jti: &str) -> AppResult<Option<AuthToken>> {
        Ok(self.base.loaders.auth_tokens.load_one(jti.to_string()).await?)
    }

    /// Log out every other session of the viewer. Returns whether any row went away.
    pub async fn delete_all_except_current(&self) -> AppResult<bool> {
        let ctx = &self.base.context;
        let (Some(viewer), Some(jti)) = (ctx.viewer.as_ref(), ctx.current_jti()) else {
            return Err(AppError::Unauthenticated(NOT_LOGGED_IN.to_string()));
        };

        let conn = self.base.pool.get()?;
        let deleted = conn.execute(
            "DELETE FROM auth_tokens WHERE user_id = ?1 AND jti != ?2",
            params![viewer.id, jti],
        )?;
        tracing::info!(user_id = %viewer.id, deleted, "Revoked other sessions");
        Ok(deleted > 0)
    }

    /// Log out a single session, which must belong to the viewer.
    pub async fn delete_by_jti(&self, jti: &str) -> AppResult<bool> {
        let forbidden = || AppError::Forbidden(NOT_YOUR_SESSION.to_string());

        let viewer = self.base.context.viewer.as_ref().ok_or_else(forbidden)?;
        let token = self
            .find_one_by_jti(jti)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("Auth token not found".to_string()))?;
        if token.user_id != viewer.id {
            return Err(forbidden());
        }

        let conn = self.base.pool.get()?;
        let deleted = conn.execute("DELETE FROM auth_tokens WHERE id = ?1", params![token.id])?;
        Ok(deleted > 0)
    }

    /// Log out the session the current request was made with.
    pub async fn delete_current(&self) -> AppResult<bool> {
        let Some(jti) = self.base.context.current_jti() else {
            return Ok(false);
        };
        let conn = self.base.pool.get()?;
        let deleted = conn.execute("DELETE FROM auth_tokens WHERE jti = ?1", params![jti])?;
        Ok(deleted > 0)
    }

    /// Sessions of `user_id`, newest first. Only the owner may list them.
    pub async fn find_connection(
        &self,
        args: &ConnectionArgs,
        user_id: &str,
    ) -> AppResult<Page<AuthToken>> {
        let ctx = &self.base.context;
        let allowed = matches!(
            (ctx.viewer.as_ref(), ctx.auth_token.as_ref()),
            (Some(viewer), Some(_)) if viewer.id == user_id
        );
        if !allowed {
            return Err(AppError::Forbidden(NOT_ALLOWED.to_string()));
        }

        let query = ConnectionQuery::new("auth_tokens", AuthToken::COLUMNS, "created_at")
            .direction(OrderDirection::Desc)
            .filter("user_id = ?", vec![Value::Text(user_id.to_string())]);
        let page = {
            let conn = self.base.pool.get()?;
            pagination::find_connection(&conn, &query, args, AuthToken::from_row)?
        };

        let current = ctx.current_jti();
        Ok(page.map(|token| AuthToken {
            is_current: Some(token.jti.as_str()) == current,
            ..token
        }))
    }

    /// Issue a token for `user` and persist its session.
    pub async fn sign_and_save_token(&self, user_agent: &UserAgent, user: &User) -> AppResult<String> {
        let tokens = &self.base.services.tokens;
        let claims = Claims::new(&user.id, tokens.expiration_hours());
        let token = tokens.sign(&claims)?;

        self.create(NewAuthToken {
            jti: claims.jti,
            user_id: user.id.clone(),
            browser: user_agent.browser.clone(),
            platform: user_agent.platform.clone(),
            os: user_agent.os.clone(),
        })
        .await?;

        tracing::info!(user_id = %user.id, "Issued session token");
        Ok(token)
    }

    /// Claims of `token` if it is authentic, unexpired and its session still exists.
    pub async fn verify_and_decode(&self, token: &str) -> Option<Claims> {
        let claims = self.base.services.tokens.verify(token).ok()?;
        match self.find_one_by_jti(&claims.jti).await {
            Ok(Some(_)) => Some(claims),
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %e, "Session lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sources::testing::*;
    use crate::data_sources::{DataSources, RequestContext};
    use crate::db::test_pool;

    #[tokio::test]
    async fn verify_requires_persisted_session() {
        let (_tmp, pool) = test_pool();
        let user = insert_user(&pool, "u1", "Ada");
        let ds = anonymous(&pool);

        let token = ds
            .auth_tokens
            .sign_and_save_token(&UserAgent::default(), &user)
            .await
            .unwrap();
        let claims = ds.auth_tokens.verify_and_decode(&token).await.unwrap();
        assert_eq!(claims.sub, "u1");

        pool.get()
            .unwrap()
            .execute("DELETE FROM auth_tokens", [])
            .unwrap();
        // Fresh request, so the loader cache does not remember the row
        assert!(anonymous(&pool)
            .auth_tokens
            .verify_and_decode(&token)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn verify_rejects_foreign_signature() {
        let (_tmp, pool) = test_pool();
        let user = insert_user(&pool, "u1", "Ada");
        let claims = Claims::new(&user.id, 1);
        let forged = crate::auth::TokenKeys::new("someone-else", 1)
            .sign(&claims)
            .unwrap();
        anonymous(&pool)
            .auth_tokens
            .create(NewAuthToken {
                jti: claims.jti.clone(),
                user_id: user.id.clone(),
                browser: None,
                platform: None,
                os: None,
            })
            .await
            .unwrap();

        assert!(anonymous(&pool)
            .auth_tokens
            .verify_and_decode(&forged)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn sign_and_save_records_user_agent() {
        let (_tmp, pool) = test_pool();
        let user = insert_user(&pool, "u1", "Ada");
        let agent = UserAgent {
            browser: Some("Firefox".into()),
            os: Some("Linux".into()),
            platform: Some("Desktop".into()),
        };
        let token = anonymous(&pool)
            .auth_tokens
            .sign_and_save_token(&agent, &user)
            .await
            .unwrap();

        let ds = DataSources::for_request(pool.clone(), services(), Some(token)).await;
        let jti = ds.context().current_jti().unwrap().to_string();
        let stored = ds.auth_tokens.find_one_by_jti(&jti).await.unwrap().unwrap();
        assert_eq!(stored.browser.as_deref(), Some("Firefox"));
        assert_eq!(stored.os.as_deref(), Some("Linux"));
        assert_eq!(stored.platform.as_deref(), Some("Desktop"));
    }

    #[tokio::test]
    async fn delete_all_except_current_keeps_current() {
        let (_tmp, pool) = test_pool();
        let ada = insert_user(&pool, "u1", "Ada");
        let bob = insert_user(&pool, "u2", "Bob");
        for _ in 0..3 {
            signed_in(&pool, &ada).await;
        }
        signed_in(&pool, &bob).await;
        let (ds, token) = signed_in(&pool, &ada).await;

        assert!(ds.auth_tokens.delete_all_except_current().await.unwrap());
        assert!(!ds.auth_tokens.delete_all_except_current().await.unwrap());

        let conn = pool.get().unwrap();
        let count = |user: &str| -> i64 {
            conn.query_row(
                "SELECT COUNT(*) FROM auth_tokens WHERE user_id = ?1",
                [user],
                |r| r.get(0),
            )
            .unwrap()
        };
        assert_eq!(count("u1"), 1);
        assert_eq!(count("u2"), 1);

        let still_valid = anonymous(&pool).auth_tokens.verify_and_decode(&token).await;
        assert!(still_valid.is_some());
    }

    #[tokio::test]
    async fn delete_all_except_current_requires_login() {
        let (_tmp, pool) = test_pool();
        let err = anonymous(&pool)
            .auth_tokens
            .delete_all_except_current()
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(ref m) if m == NOT_LOGGED_IN));
    }

    #[tokio::test]
    async fn delete_by_jti_enforces_ownership() {
        let (_tmp, pool) = test_pool();
        let ada = insert_user(&pool, "u1", "Ada");
        let bob = insert_user(&pool, "u2", "Bob");
        let (ada_ds, _) = signed_in(&pool, &ada).await;
        let (bob_ds, _) = signed_in(&pool, &bob).await;
        let bob_jti = bob_ds.context().current_jti().unwrap().to_string();

        let err = ada_ds.auth_tokens.delete_by_jti(&bob_jti).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == NOT_YOUR_SESSION));

        let err = anonymous(&pool)
            .auth_tokens
            .delete_by_jti(&bob_jti)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = ada_ds.auth_tokens.delete_by_jti("missing").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(ref m) if m == "Auth token not found"));

        assert!(bob_ds.auth_tokens.delete_by_jti(&bob_jti).await.unwrap());
    }

    #[tokio::test]
    async fn sessions_page_two_at_a_time() {
        let (_tmp, pool) = test_pool();
        let ada = insert_user(&pool, "u1", "Ada");
        for _ in 0..4 {
            signed_in(&pool, &ada).await;
        }
        let (ds, _) = signed_in(&pool, &ada).await;

        let mut seen = Vec::new();
        let mut after = None;
        let mut last_has_next = true;
        for _ in 0..3 {
            let page = ds
                .auth_tokens
                .find_connection(&ConnectionArgs::new(2, after.clone()), "u1")
                .await
                .unwrap();
            seen.extend(page.edges.iter().map(|e| e.node.jti.clone()));
            after = page.end_cursor().map(String::from);
            last_has_next = page.has_next_page;
        }

        assert_eq!(seen.len(), 5);
        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);
        assert!(!last_has_next);
    }

    #[tokio::test]
    async fn session_list_marks_current_and_is_private() {
        let (_tmp, pool) = test_pool();
        let ada = insert_user(&pool, "u1", "Ada");
        insert_user(&pool, "u2", "Bob");
        signed_in(&pool, &ada).await;
        let (ds, _) = signed_in(&pool, &ada).await;

        let page = ds
            .auth_tokens
            .find_connection(&ConnectionArgs::new(10, None), "u1")
            .await
            .unwrap();
        let current: Vec<_> = page.edges.iter().filter(|e| e.node.is_current).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(Some(current[0].node.jti.as_str()), ds.context().current_jti());

        let err = ds
            .auth_tokens
            .find_connection(&ConnectionArgs::new(10, None), "u2")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == NOT_ALLOWED));

        let stranger = DataSources::new(pool.clone(), services(), RequestContext::default());
        assert!(stranger
            .auth_tokens
            .find_connection(&ConnectionArgs::new(10, None), "u1")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn delete_current_revokes_own_token() {
        let (_tmp, pool) = test_pool();
        let ada = insert_user(&pool, "u1", "Ada");
        let (ds, token) = signed_in(&pool, &ada).await;

        assert!(ds.auth_tokens.delete_current().await.unwrap());
        assert!(anonymous(&pool).auth_tokens.verify_and_decode(&token).await.is_none());
        assert!(!anonymous(&pool).auth_tokens.delete_current().await.unwrap());
    }
}
