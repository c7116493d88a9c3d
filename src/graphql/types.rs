use async_graphql::connection::Connection;
use async_graphql::*;

use crate::data_sources::DataSources;
use crate::db::models::{AuthToken, Category, Comment, Media, Post, Reaction, User};
use crate::db::pagination::ConnectionArgs;
use crate::error::{AppError, AppResult};

/// Convert repository errors into GraphQL errors carrying `extensions.code`.
pub(crate) trait ResultExt<T> {
    fn gql(self) -> Result<T>;
}

impl<T> ResultExt<T> for AppResult<T> {
    fn gql(self) -> Result<T> {
        self.map_err(|e| e.extend())
    }
}

pub(crate) fn data_sources<'a>(ctx: &Context<'a>) -> Result<&'a DataSources> {
    ctx.data::<DataSources>()
}

pub(crate) fn connection_args(first: i32, after: Option<String>) -> ConnectionArgs {
    ConnectionArgs::new(first.max(0) as u32, after)
}

/// Input for creating a post
#[derive(Debug, Clone, InputObject)]
pub struct CreatePostInput {
    pub content: String,

    /// Category to file the post under (optional)
    pub category_id: Option<ID>,

    /// Images attached to the post, in display order
    pub media: Option<Vec<MediaInput>>,
}

/// An image attached to a post
#[derive(Debug, Clone, InputObject)]
pub struct MediaInput {
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

#[derive(Debug, Clone, InputObject)]
pub struct CreateCommentInput {
    pub post_id: ID,
    pub content: String,
}

/// Profile fields a user may edit
#[derive(Debug, Clone, InputObject)]
pub struct UserInput {
    pub display_name: String,
    pub email: String,
}

#[ComplexObject]
impl Post {
    async fn id(&self) -> ID {
        ID::from(&self.id)
    }

    async fn author(&self, ctx: &Context<'_>) -> Result<User> {
        data_sources(ctx)?
            .users
            .find_by_id(&self.user_id)
            .await
            .and_then(|user| {
                user.ok_or_else(|| AppError::NotFound("Author not found".to_string()))
            })
            .gql()
    }

    async fn category(&self, ctx: &Context<'_>) -> Result<Option<Category>> {
        let Some(category_id) = &self.category_id else {
            return Ok(None);
        };
        data_sources(ctx)?.categories.find_by_id(category_id).await.gql()
    }

    async fn media(&self, ctx: &Context<'_>) -> Result<Vec<Media>> {
        data_sources(ctx)?.media.find_by_post_id(&self.id).await.gql()
    }

    async fn reactions_count(&self, ctx: &Context<'_>) -> Result<i64> {
        data_sources(ctx)?
            .reactions
            .count_by_reactable_id(&self.id)
            .await
            .gql()
    }

    /// The viewer's own reaction, if any
    async fn viewer_reaction(&self, ctx: &Context<'_>) -> Result<Option<Reaction>> {
        data_sources(ctx)?
            .reactions
            .find_viewer_reaction(&self.id)
            .await
            .gql()
    }

    async fn comments_count(&self, ctx: &Context<'_>) -> Result<i64> {
        data_sources(ctx)?.comments.count_by_post_id(&self.id).await.gql()
    }

    async fn comments(
        &self,
        ctx: &Context<'_>,
        #[graphql(validator(minimum = 0))] first: i32,
        after: Option<String>,
    ) -> Result<Connection<String, Comment>> {
        data_sources(ctx)?
            .comments
            .find_connection_by_post_id(&self.id, &connection_args(first, after))
            .await
            .map(|page| page.into_connection())
            .gql()
    }
}

#[ComplexObject]
impl Comment {
    async fn id(&self) -> ID {
        ID::from(&self.id)
    }

    async fn author(&self, ctx: &Context<'_>) -> Result<User> {
        data_sources(ctx)?
            .users
            .find_by_id(&self.user_id)
            .await
            .and_then(|user| {
                user.ok_or_else(|| AppError::NotFound("Author not found".to_string()))
            })
            .gql()
    }

    async fn reactions_count(&self, ctx: &Context<'_>) -> Result<i64> {
        data_sources(ctx)?
            .reactions
            .count_by_reactable_id(&self.id)
            .await
            .gql()
    }
}

#[ComplexObject]
impl User {
    async fn id(&self) -> ID {
        ID::from(&self.id)
    }

    async fn posts_count(&self, ctx: &Context<'_>) -> Result<i64> {
        data_sources(ctx)?.users.count_posts(&self.id).await.gql()
    }

    async fn posts(
        &self,
        ctx: &Context<'_>,
        #[graphql(validator(minimum = 0))] first: i32,
        after: Option<String>,
    ) -> Result<Connection<String, Post>> {
        data_sources(ctx)?
            .posts
            .find_connection(&connection_args(first, after), Some(&self.id))
            .await
            .map(|page| page.into_connection())
            .gql()
    }

    /// Login sessions; only visible to the user themselves
    async fn sessions(
        &self,
        ctx: &Context<'_>,
        #[graphql(validator(minimum = 0))] first: i32,
        after: Option<String>,
    ) -> Result<Connection<String, AuthToken>> {
        data_sources(ctx)?
            .auth_tokens
            .find_connection(&connection_args(first, after), &self.id)
            .await
            .map(|page| page.into_connection())
            .gql()
    }
}

#[ComplexObject]
impl Category {
    async fn id(&self) -> ID {
        ID::from(&self.id)
    }
}

#[ComplexObject]
impl Media {
    async fn id(&self) -> ID {
        ID::from(&self.id)
    }
}

#[ComplexObject]
impl Reaction {
    async fn id(&self) -> ID {
        ID::from(&self.id)
    }

    /// The post or comment reacted to
    async fn reactable_id(&self) -> ID {
        ID::from(&self.reactable_id)
    }
}

#[ComplexObject]
impl AuthToken {
    /// The token's `jti`; pass it to `deleteViewerSession` to revoke the session
    async fn id(&self) -> ID {
        ID::from(&self.jti)
    }
}
