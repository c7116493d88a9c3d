use rusqlite::params;

use super::Base;
use crate::db::models::Media;
use crate::db::{new_id, now_timestamp};
use crate::error::AppResult;
use crate::graphql::types::MediaInput;

/// Insert `media` for a post, keeping the given order as `position`.
pub(crate) fn insert_for_post(
    conn: &rusqlite::Connection,
    post_id: &str,
    media: &[MediaInput],
) -> AppResult<()> {
    let created_at = now_timestamp();
    let mut stmt = conn.prepare(
        "INSERT INTO media (id, post_id, url, width, height, position, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (position, item) in media.iter().enumerate() {
        stmt.execute(params![
            new_id(),
            post_id,
            item.url.trim(),
            item.width,
            item.height,
            position as i64,
            created_at
        ])?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct MediaRepository {
    base: Base,
}

impl MediaRepository {
    pub(crate) fn new(base: Base) -> Self {
        Self { base }
    }

    pub async fn find_by_post_id(&self, post_id: &str) -> AppResult<Vec<Media>> {
        let media = self
            .base
            .loaders
            .media
            .load_one(post_id.to_string())
            .await?;
        Ok(media.unwrap_or_default())
    }
}
