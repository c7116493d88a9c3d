//! Request-scoped batch loaders.
//!
//! Every lookup issued while resolving one request is queued on the matching
//! loader and flushed as a single `IN (...)` query. Results are cached for the
//! rest of the request; a fresh [`Loaders`] is built for every request.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dataloader::{DataLoader, HashMapCache, Loader};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Row};

use crate::db::models::{AuthToken, Category, Media, Post, Reaction, User};
use crate::db::{placeholders, DbPool};
use crate::error::{AppError, AppResult};

pub type LoadError = Arc<AppError>;

/// Run `SELECT {columns} FROM {table} WHERE {key_column} IN (keys)` and index
/// the rows by `key_of`.
fn load_rows<V, F, K>(
    pool: &DbPool,
    table: &str,
    columns: &str,
    key_column: &str,
    keys: &[String],
    map_row: F,
    key_of: K,
) -> AppResult<Vec<(String, V)>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<V>,
    K: Fn(&V) -> String,
{
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let conn = pool.get()?;
    let sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({})",
        columns,
        table,
        key_column,
        placeholders(keys.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(keys.iter()), map_row)?
        .collect::<Result<Vec<V>, _>>()?;
    Ok(rows.into_iter().map(|row| (key_of(&row), row)).collect())
}

/// `SELECT {key_column}, COUNT(*) ... GROUP BY {key_column}`; keys without rows count as zero.
fn load_counts(
    pool: &DbPool,
    table: &str,
    key_column: &str,
    keys: &[String],
) -> AppResult<HashMap<String, i64>> {
    let mut counts: HashMap<String, i64> = keys.iter().map(|k| (k.clone(), 0)).collect();
    if keys.is_empty() {
        return Ok(counts);
    }
    let conn = pool.get()?;
    let sql = format!(
        "SELECT {key}, COUNT(*) FROM {table} WHERE {key} IN ({ph}) GROUP BY {key}",
        key = key_column,
        table = table,
        ph = placeholders(keys.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(keys.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (key, count) = row?;
        counts.insert(key, count);
    }
    Ok(counts)
}

pub struct UserLoader {
    pool: DbPool,
}

#[async_trait::async_trait]
impl Loader<String> for UserLoader {
    type Value = User;
    type Error = LoadError;

    async fn load(&self, keys: &[String]) -> Result<HashMap<String, User>, LoadError> {
        let rows = load_rows(
            &self.pool,
            "users",
            User::COLUMNS,
            "id",
            keys,
            User::from_row,
            |u| u.id.clone(),
        )?;
        Ok(rows.into_iter().collect())
    }
}

pub struct PostLoader {
    pool: DbPool,
}

#[async_trait::async_trait]
impl Loader<String> for PostLoader {
    type Value = Post;
    type Error = LoadError;

    async fn load(&self, keys: &[String]) -> Result<HashMap<String, Post>, LoadError> {
        let rows = load_rows(
            &self.pool,
            "posts",
            Post::COLUMNS,
            "id",
            keys,
            Post::from_row,
            |p| p.id.clone(),
        )?;
        Ok(rows.into_iter().collect())
    }
}

pub struct CategoryLoader {
    pool: DbPool,
}

#[async_trait::async_trait]
impl Loader<String> for CategoryLoader {
    type Value = Category;
    type Error = LoadError;

    async fn load(&self, keys: &[String]) -> Result<HashMap<String, Category>, LoadError> {
        let rows = load_rows(
            &self.pool,
            "categories",
            Category::COLUMNS,
            "id",
            keys,
            Category::from_row,
            |c| c.id.clone(),
        )?;
        Ok(rows.into_iter().collect())
    }
}

pub struct AuthTokenLoader {
    pool: DbPool,
}

#[async_trait::async_trait]
impl Loader<String> for AuthTokenLoader {
    type Value = AuthToken;
    type Error = LoadError;

    /// Keyed by `jti`.
    async fn load(&self, keys: &[String]) -> Result<HashMap<String, AuthToken>, LoadError> {
        let rows = load_rows(
            &self.pool,
            "auth_tokens",
            AuthToken::COLUMNS,
            "jti",
            keys,
            AuthToken::from_row,
            |t| t.jti.clone(),
        )?;
        Ok(rows.into_iter().collect())
    }
}

pub struct MediaLoader {
    pool: DbPool,
}

#[async_trait::async_trait]
impl Loader<String> for MediaLoader {
    type Value = Vec<Media>;
    type Error = LoadError;

    /// Keyed by post id; every post gets an entry, ordered by position.
    async fn load(&self, keys: &[String]) -> Result<HashMap<String, Vec<Media>>, LoadError> {
        let rows = load_rows(
            &self.pool,
            "media",
            Media::COLUMNS,
            "post_id",
            keys,
            Media::from_row,
            |m| m.post_id.clone(),
        )?;
        let mut grouped: HashMap<String, Vec<Media>> =
            keys.iter().map(|k| (k.clone(), Vec::new())).collect();
        for (post_id, media) in rows {
            grouped.entry(post_id).or_default().push(media);
        }
        for media in grouped.values_mut() {
            media.sort_by_key(|m| m.position);
        }
        Ok(grouped)
    }
}

pub struct CommentCountLoader {
    pool: DbPool,
}

#[async_trait::async_trait]
impl Loader<String> for CommentCountLoader {
    type Value = i64;
    type Error = LoadError;

    async fn load(&self, keys: &[String]) -> Result<HashMap<String, i64>, LoadError> {
        Ok(load_counts(&self.pool, "comments", "post_id", keys)?)
    }
}

pub struct ReactionCountLoader {
    pool: DbPool,
}

#[async_trait::async_trait]
impl Loader<String> for ReactionCountLoader {
    type Value = i64;
    type Error = LoadError;

    async fn load(&self, keys: &[String]) -> Result<HashMap<String, i64>, LoadError> {
        Ok(load_counts(&self.pool, "reactions", "reactable_id", keys)?)
    }
}

pub struct PostCountLoader {
    pool: DbPool,
}

#[async_trait::async_trait]
impl Loader<String> for PostCountLoader {
    type Value = i64;
    type Error = LoadError;

    async fn load(&self, keys: &[String]) -> Result<HashMap<String, i64>, LoadError> {
        Ok(load_counts(&self.pool, "posts", "user_id", keys)?)
    }
}

/// A user's own reaction on a post or comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReactionKey {
    pub reactable_id: String,
    pub user_id: String,
}

pub struct UserReactionLoader {
    pool: DbPool,
}

#[async_trait::async_trait]
impl Loader<ReactionKey> for UserReactionLoader {
    type Value = Reaction;
    type Error = LoadError;

    async fn load(
        &self,
        keys: &[ReactionKey],
    ) -> Result<HashMap<ReactionKey, Reaction>, LoadError> {
        // Keys almost always share one user, so group by it
        let mut by_user: HashMap<&str, Vec<String>> = HashMap::new();
        for key in keys {
            by_user
                .entry(key.user_id.as_str())
                .or_default()
                .push(key.reactable_id.clone());
        }

        let conn = self.pool.get().map_err(AppError::from)?;
        let mut found = HashMap::new();
        for (user_id, reactable_ids) in by_user {
            let sql = format!(
                "SELECT {} FROM reactions WHERE user_id = ? AND reactable_id IN ({})",
                Reaction::COLUMNS,
                placeholders(reactable_ids.len())
            );
            let mut params = vec![Value::Text(user_id.to_string())];
            params.extend(reactable_ids.into_iter().map(Value::Text));

            let mut stmt = conn.prepare(&sql).map_err(AppError::from)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), Reaction::from_row)
                .map_err(AppError::from)?;
            for row in rows {
                let reaction = row.map_err(AppError::from)?;
                found.insert(
                    ReactionKey {
                        reactable_id: reaction.reactable_id.clone(),
                        user_id: reaction.user_id.clone(),
                    },
                    reaction,
                );
            }
        }
        Ok(found)
    }
}

/// All loaders for one request.
pub struct Loaders {
    pub users: DataLoader<UserLoader, HashMapCache>,
    pub posts: DataLoader<PostLoader, HashMapCache>,
    pub categories: DataLoader<CategoryLoader, HashMapCache>,
    pub auth_tokens: DataLoader<AuthTokenLoader, HashMapCache>,
    pub media: DataLoader<MediaLoader, HashMapCache>,
    pub comment_counts: DataLoader<CommentCountLoader, HashMapCache>,
    pub reaction_counts: DataLoader<ReactionCountLoader, HashMapCache>,
    pub post_counts: DataLoader<PostCountLoader, HashMapCache>,
    pub user_reactions: DataLoader<UserReactionLoader, HashMapCache>,
}

fn cached<T: Send + Sync + 'static>(loader: T) -> DataLoader<T, HashMapCache> {
    DataLoader::with_cache(loader, tokio::spawn, HashMapCache::default())
}

impl Loaders {
    pub fn new(pool: &DbPool) -> Self {
        Self {
            users: cached(UserLoader { pool: pool.clone() }),
            posts: cached(PostLoader { pool: pool.clone() }),
            categories: cached(CategoryLoader { pool: pool.clone() }),
            auth_tokens: cached(AuthTokenLoader { pool: pool.clone() }),
            media: cached(MediaLoader { pool: pool.clone() }),
            comment_counts: cached(CommentCountLoader { pool: pool.clone() }),
            reaction_counts: cached(ReactionCountLoader { pool: pool.clone() }),
            post_counts: cached(PostCountLoader { pool: pool.clone() }),
            user_reactions: cached(UserReactionLoader { pool: pool.clone() }),
        }
    }
}
