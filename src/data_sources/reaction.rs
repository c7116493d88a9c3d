use rusqlite::{params, OptionalExtension};

use super::Base;
use crate::db::loaders::ReactionKey;
use crate::db::models::{Reaction, ReactionType};
use crate::db::{new_id, now_timestamp};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ReactionRepository {
    base: Base,
}

impl ReactionRepository {
    pub(crate) fn new(base: Base) -> Self {
        Self { base }
    }

    pub async fn count_by_reactable_id(&self, reactable_id: &str) -> AppResult<i64> {
        let count = self
            .base
            .loaders
            .reaction_counts
            .load_one(reactable_id.to_string())
            .await?;
        Ok(count.unwrap_or(0))
    }

    /// The viewer's reaction, `None` when anonymous or not reacted.
    pub async fn find_viewer_reaction(&self, reactable_id: &str) -> AppResult<Option<Reaction>> {
        let Some(viewer) = self.base.context.viewer.as_ref() else {
            return Ok(None);
        };
        let key = ReactionKey {
            reactable_id: reactable_id.to_string(),
            user_id: viewer.id.clone(),
        };
        Ok(self.base.loaders.user_reactions.load_one(key).await?)
    }

    /// React to a post or comment, replacing any earlier reaction of the viewer.
    pub async fn react(&self, reactable_id: &str, kind: ReactionType) -> AppResult<Reaction> {
        let viewer = self.base.context.require_viewer()?;

        let conn = self.base.pool.get()?;
        let exists = conn
            .query_row(
                "SELECT 1 FROM posts WHERE id = ?1 UNION ALL SELECT 1 FROM comments WHERE id = ?1",
                params![reactable_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Err(AppError::NotFound("Nothing to react to".to_string()));
        }

        conn.execute(
            "INSERT INTO reactions (id, reactable_id, user_id, type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (reactable_id, user_id) DO UPDATE SET type = excluded.type",
            params![
                new_id(),
                reactable_id,
                viewer.id,
                kind.as_str(),
                now_timestamp()
            ],
        )?;

        let reaction = conn.query_row(
            &format!(
                "SELECT {} FROM reactions WHERE reactable_id = ?1 AND user_id = ?2",
                Reaction::COLUMNS
            ),
            params![reactable_id, viewer.id],
            Reaction::from_row,
        )?;
        Ok(reaction)
    }

    pub async fn unreact(&self, reactable_id: &str) -> AppResult<bool> {
        let viewer = self.base.context.require_viewer()?;
        let conn = self.base.pool.get()?;
        let deleted = conn.execute(
            "DELETE FROM reactions WHERE reactable_id = ?1 AND user_id = ?2",
            params![reactable_id, viewer.id],
        )?;
        Ok(deleted > 0)
    }
}
