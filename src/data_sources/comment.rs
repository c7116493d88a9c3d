use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension};

use super::{Base, NOT_ALLOWED};
use crate::db::models::Comment;
use crate::db::pagination::{self, ConnectionArgs, ConnectionQuery, OrderDirection, Page};
use crate::db::{new_id, now_timestamp, parse_timestamp};
use crate::error::{AppError, AppResult};
use crate::graphql::types::CreateCommentInput;

#[derive(Clone)]
pub struct CommentRepository {
    base: Base,
}

impl CommentRepository {
    pub(crate) fn new(base: Base) -> Self {
        Self { base }
    }

    /// Comments of a post, newest first.
    pub async fn find_connection_by_post_id(
        &self,
        post_id: &str,
        args: &ConnectionArgs,
    ) -> AppResult<Page<Comment>> {
        let query = ConnectionQuery::new("comments", Comment::COLUMNS, "created_at")
            .direction(OrderDirection::Desc)
            .filter("post_id = ?", vec![Value::Text(post_id.to_string())]);
        let conn = self.base.pool.get()?;
        pagination::find_connection(&conn, &query, args, Comment::from_row)
    }

    pub async fn count_by_post_id(&self, post_id: &str) -> AppResult<i64> {
        let count = self
            .base
            .loaders
            .comment_counts
            .load_one(post_id.to_string())
            .await?;
        Ok(count.unwrap_or(0))
    }

    pub async fn create(&self, input: &CreateCommentInput) -> AppResult<Comment> {
        let viewer = self.base.context.require_viewer()?;
        let content = input.content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest(
                "Comment content cannot be empty".to_string(),
            ));
        }

        let post_id = input.post_id.to_string();
        let id = new_id();
        let now = now_timestamp();

        let conn = self.base.pool.get()?;
        let post_exists = conn
            .query_row("SELECT 1 FROM posts WHERE id = ?1", params![post_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !post_exists {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        conn.execute(
            "INSERT INTO comments (id, post_id, user_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, post_id, viewer.id, content, now],
        )?;

        Ok(Comment {
            id,
            post_id,
            user_id: viewer.id.clone(),
            content: content.to_string(),
            created_at: parse_timestamp(&now),
        })
    }

    /// Delete one of the viewer's comments and the reactions on it.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let viewer = self.base.context.require_viewer()?;

        let mut conn = self.base.pool.get()?;
        let owner: Option<String> = conn
            .query_row(
                "SELECT user_id FROM comments WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(owner) = owner else {
            return Err(AppError::NotFound("Comment not found".to_string()));
        };
        if owner != viewer.id {
            return Err(AppError::Forbidden(NOT_ALLOWED.to_string()));
        }

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM reactions WHERE reactable_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }
}
