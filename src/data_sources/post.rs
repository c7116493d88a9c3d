use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension};

use super::{media, Base, NOT_ALLOWED};
use crate::db::models::Post;
use crate::db::pagination::{self, ConnectionArgs, ConnectionQuery, OrderDirection, Page};
use crate::db::{new_id, now_timestamp, parse_timestamp};
use crate::error::{AppError, AppResult};
use crate::graphql::types::CreatePostInput;

#[derive(Clone)]
pub struct PostRepository {
    base: Base,
}

impl PostRepository {
    pub(crate) fn new(base: Base) -> Self {
        Self { base }
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Post>> {
        Ok(self.base.loaders.posts.load_one(id.to_string()).await?)
    }

    /// Newest first; restricted to one author when `user_id` is given.
    pub async fn find_connection(
        &self,
        args: &ConnectionArgs,
        user_id: Option<&str>,
    ) -> AppResult<Page<Post>> {
        let mut query = ConnectionQuery::new("posts", Post::COLUMNS, "created_at")
            .direction(OrderDirection::Desc);
        if let Some(user_id) = user_id {
            query = query.filter("user_id = ?", vec![Value::Text(user_id.to_string())]);
        }
        let conn = self.base.pool.get()?;
        pagination::find_connection(&conn, &query, args, Post::from_row)
    }

    pub async fn create(&self, input: &CreatePostInput) -> AppResult<Post> {
        let viewer = self.base.context.require_viewer()?;
        let content = input.content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest(
                "Post content cannot be empty".to_string(),
            ));
        }
        let media = input.media.as_deref().unwrap_or_default();
        if media.iter().any(|m| m.url.trim().is_empty()) {
            return Err(AppError::BadRequest("Media url cannot be empty".to_string()));
        }

        let id = new_id();
        let now = now_timestamp();
        let category_id = input.category_id.as_ref().map(|c| c.to_string());

        let mut conn = self.base.pool.get()?;
        let tx = conn.transaction()?;
        if let Some(category_id) = &category_id {
            let exists = tx
                .query_row(
                    "SELECT 1 FROM categories WHERE id = ?1",
                    params![category_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !exists {
                return Err(AppError::BadRequest(format!(
                    "Unknown category: {}",
                    category_id
                )));
            }
        }
        tx.execute(
            "INSERT INTO posts (id, user_id, category_id, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, viewer.id, category_id, content, now],
        )?;
        media::insert_for_post(&tx, &id, media)?;
        tx.commit()?;

        tracing::info!(post_id = %id, user_id = %viewer.id, "Created post");
        Ok(Post {
            id,
            user_id: viewer.id.clone(),
            category_id,
            content: content.to_string(),
            created_at: parse_timestamp(&now),
            updated_at: parse_timestamp(&now),
        })
    }

    /// Delete a post of the viewer together with its comments, media and reactions.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let viewer = self.base.context.require_viewer()?;

        let mut conn = self.base.pool.get()?;
        let owner: Option<String> = conn
            .query_row(
                "SELECT user_id FROM posts WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match owner {
            None => return Err(AppError::NotFound("Post not found".to_string())),
            Some(owner) if owner != viewer.id => {
                return Err(AppError::Forbidden(NOT_ALLOWED.to_string()))
            }
            Some(_) => {}
        }

        // Reactions point at posts and comments without a foreign key
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM reactions
             WHERE reactable_id = ?1
                OR reactable_id IN (SELECT id FROM comments WHERE post_id = ?1)",
            params![id],
        )?;
        let deleted = tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        tx.commit()?;

        tracing::info!(post_id = %id, "Deleted post");
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sources::testing::*;
    use crate::db::test_pool;
    use crate::graphql::types::MediaInput;
    use async_graphql::ID;

    fn post_input(content: &str) -> CreatePostInput {
        CreatePostInput {
            content: content.to_string(),
            category_id: None,
            media: None,
        }
    }

    #[tokio::test]
    async fn create_requires_login_and_content() {
        let (_tmp, pool) = test_pool();
        let ada = insert_user(&pool, "u1", "Ada");

        let err = anonymous(&pool)
            .posts
            .create(&post_input("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));

        let (ds, _) = signed_in(&pool, &ada).await;
        let err = ds.posts.create(&post_input("   ")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn create_stores_media_in_order() {
        let (_tmp, pool) = test_pool();
        let ada = insert_user(&pool, "u1", "Ada");
        let (ds, _) = signed_in(&pool, &ada).await;

        let post = ds
            .posts
            .create(&CreatePostInput {
                content: " sunset ".into(),
                category_id: Some(ID::from("photos")),
                media: Some(vec![
                    MediaInput {
                        url: "https://img/1.jpg".into(),
                        width: Some(800),
                        height: Some(600),
                    },
                    MediaInput {
                        url: "https://img/2.jpg".into(),
                        width: None,
                        height: None,
                    },
                ]),
            })
            .await
            .unwrap();
        assert_eq!(post.content, "sunset");
        assert_eq!(post.category_id.as_deref(), Some("photos"));

        let media = ds.media.find_by_post_id(&post.id).await.unwrap();
        let urls: Vec<_> = media.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(urls, vec!["https://img/1.jpg", "https://img/2.jpg"]);
    }

    #[tokio::test]
    async fn create_rejects_unknown_category() {
        let (_tmp, pool) = test_pool();
        let ada = insert_user(&pool, "u1", "Ada");
        let (ds, _) = signed_in(&pool, &ada).await;

        let err = ds
            .posts
            .create(&CreatePostInput {
                category_id: Some(ID::from("nope")),
                ..post_input("hi")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let count: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn delete_checks_owner_and_cleans_up() {
        let (_tmp, pool) = test_pool();
        let ada = insert_user(&pool, "u1", "Ada");
        let bob = insert_user(&pool, "u2", "Bob");
        let (ada_ds, _) = signed_in(&pool, &ada).await;
        let (bob_ds, _) = signed_in(&pool, &bob).await;

        let post = ada_ds.posts.create(&post_input("mine")).await.unwrap();
        pool.get()
            .unwrap()
            .execute_batch(&format!(
                "INSERT INTO comments (id, post_id, user_id, content) VALUES ('c1', '{id}', 'u2', 'hey');
                 INSERT INTO reactions (id, reactable_id, user_id, type) VALUES ('r1', '{id}', 'u2', 'LIKE');
                 INSERT INTO reactions (id, reactable_id, user_id, type) VALUES ('r2', 'c1', 'u1', 'HAHA');",
                id = post.id
            ))
            .unwrap();

        let err = bob_ds.posts.delete(&post.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = ada_ds.posts.delete("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert!(ada_ds.posts.delete(&post.id).await.unwrap());
        let conn = pool.get().unwrap();
        let leftovers: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM comments) + (SELECT COUNT(*) FROM reactions)",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn connection_filters_by_author() {
        let (_tmp, pool) = test_pool();
        let ada = insert_user(&pool, "u1", "Ada");
        let bob = insert_user(&pool, "u2", "Bob");
        let (ada_ds, _) = signed_in(&pool, &ada).await;
        let (bob_ds, _) = signed_in(&pool, &bob).await;
        ada_ds.posts.create(&post_input("a1")).await.unwrap();
        bob_ds.posts.create(&post_input("b1")).await.unwrap();
        ada_ds.posts.create(&post_input("a2")).await.unwrap();

        let all = ada_ds
            .posts
            .find_connection(&ConnectionArgs::new(10, None), None)
            .await
            .unwrap();
        assert_eq!(all.edges.len(), 3);

        let ada_only = ada_ds
            .posts
            .find_connection(&ConnectionArgs::new(10, None), Some("u1"))
            .await
            .unwrap();
        let contents: Vec<_> = ada_only.edges.iter().map(|e| e.node.content.as_str()).collect();
        assert_eq!(contents.len(), 2);
        assert!(contents.contains(&"a1") && contents.contains(&"a2"));
    }
}
