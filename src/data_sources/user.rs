use rusqlite::{params, OptionalExtension};

use super::{Base, NOT_ALLOWED};
use crate::auth::{SocialAccountType, SocialProfile};
use crate::db::models::User;
use crate::db::{is_unique_violation, new_id, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::graphql::types::UserInput;

fn select_user(conn: &rusqlite::Connection, column: &str, value: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", User::COLUMNS, column);
    Ok(conn
        .query_row(&sql, params![value], User::from_row)
        .optional()?)
}

/// Display name must be non-blank, email must look like `local@domain.tld`.
pub fn validate_user_input(input: &UserInput) -> AppResult<(String, String)> {
    let display_name = input.display_name.trim();
    if display_name.is_empty() {
        return Err(AppError::BadRequest(
            "Display name cannot be empty".to_string(),
        ));
    }

    let email = input.email.trim();
    if !looks_like_email(email) {
        return Err(AppError::BadRequest(format!(
            "Invalid email address: {}",
            email
        )));
    }

    Ok((display_name.to_string(), email.to_lowercase()))
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

#[derive(Clone)]
pub struct UserRepository {
    base: Base,
}

impl UserRepository {
    pub(crate) fn new(base: Base) -> Self {
        Self { base }
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.base.loaders.users.load_one(id.to_string()).await?)
    }

    pub async fn count_posts(&self, user_id: &str) -> AppResult<i64> {
        let count = self
            .base
            .loaders
            .post_counts
            .load_one(user_id.to_string())
            .await?;
        Ok(count.unwrap_or(0))
    }

    /// Re-read a user, bypassing the request cache (used after writes).
    fn reload(&self, id: &str) -> AppResult<User> {
        let conn = self.base.pool.get()?;
        select_user(&conn, "id", id)?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn update(&self, id: &str, input: &UserInput) -> AppResult<User> {
        let viewer = self.base.context.require_viewer()?;
        if viewer.id != id {
            return Err(AppError::Forbidden(NOT_ALLOWED.to_string()));
        }
        let (display_name, email) = validate_user_input(input)?;

        {
            let conn = self.base.pool.get()?;
            conn.execute(
                "UPDATE users SET display_name = ?1, email = ?2 WHERE id = ?3",
                params![display_name, email, id],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::BadRequest("Email is already in use".to_string())
                } else {
                    e.into()
                }
            })?;
        }

        self.reload(id)
    }

    /// Verify `token` with the provider and attach the profile to the viewer.
    pub async fn link_viewer_social_account(
        &self,
        kind: SocialAccountType,
        token: &str,
    ) -> AppResult<User> {
        let viewer = self.base.context.require_viewer()?;
        let profile = self.base.services.social.verify(kind, token).await?;

        let conn = self.base.pool.get()?;
        if let Some(owner) = select_user(&conn, kind.profile_column(), &profile.id)? {
            if owner.id != viewer.id {
                return Err(AppError::BadRequest(
                    "This account is already linked to another user".to_string(),
                ));
            }
        }
        conn.execute(
            &format!("UPDATE users SET {} = ?1 WHERE id = ?2", kind.profile_column()),
            params![profile.id, viewer.id],
        )?;
        drop(conn);

        tracing::info!(user_id = %viewer.id, provider = ?kind, "Linked social account");
        self.reload(&viewer.id)
    }

    pub async fn unlink_viewer_social_account(&self, kind: SocialAccountType) -> AppResult<User> {
        let viewer = self.base.context.require_viewer()?;
        {
            let conn = self.base.pool.get()?;
            conn.execute(
                &format!("UPDATE users SET {} = NULL WHERE id = ?1", kind.profile_column()),
                params![viewer.id],
            )?;
        }
        self.reload(&viewer.id)
    }

    /// Login through a provider: reuse the linked user, else link by verified email, else sign up.
    pub async fn find_or_create_by_social(
        &self,
        kind: SocialAccountType,
        profile: &SocialProfile,
    ) -> AppResult<User> {
        let conn = self.base.pool.get()?;
        if let Some(user) = select_user(&conn, kind.profile_column(), &profile.id)? {
            return Ok(user);
        }

        let email = profile
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| looks_like_email(e))
            .ok_or_else(|| {
                AppError::BadRequest("The social account has no usable email address".to_string())
            })?;

        if let Some(user) = select_user(&conn, "email", &email)? {
            // Only a provider-verified address may take over an existing account
            if !profile.email_verified {
                return Err(AppError::BadRequest(
                    "An account with this email already exists. Log in and link this account instead"
                        .to_string(),
                ));
            }
            conn.execute(
                &format!("UPDATE users SET {} = ?1 WHERE id = ?2", kind.profile_column()),
                params![profile.id, user.id],
            )?;
            drop(conn);
            return self.reload(&user.id);
        }

        let id = new_id();
        let display_name = profile
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("New user");
        conn.execute(
            &format!(
                "INSERT INTO users (id, display_name, email, thumbnail_url, {}, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                kind.profile_column()
            ),
            params![
                id,
                display_name,
                email,
                profile.thumbnail_url,
                profile.id,
                now_timestamp()
            ],
        )?;
        drop(conn);

        tracing::info!(user_id = %id, provider = ?kind, "Created user from social login");
        self.reload(&id)
    }
}
