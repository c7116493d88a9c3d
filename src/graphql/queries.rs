use async_graphql::connection::Connection;
use async_graphql::*;

use crate::db::models::{Category, Post, User};
use crate::graphql::types::{connection_args, data_sources, ResultExt};

/// GraphQL Query root
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn post(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Post>> {
        data_sources(ctx)?.posts.find_by_id(&id).await.gql()
    }

    /// All posts, newest first
    async fn posts(
        &self,
        ctx: &Context<'_>,
        #[graphql(validator(minimum = 0))] first: i32,
        after: Option<String>,
    ) -> Result<Connection<String, Post>> {
        data_sources(ctx)?
            .posts
            .find_connection(&connection_args(first, after), None)
            .await
            .map(|page| page.into_connection())
            .gql()
    }

    async fn user(&self, ctx: &Context<'_>, id: ID) -> Result<Option<User>> {
        data_sources(ctx)?.users.find_by_id(&id).await.gql()
    }

    /// The authenticated user, or null
    async fn viewer(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        Ok(data_sources(ctx)?.viewer().cloned())
    }

    async fn categories(&self, ctx: &Context<'_>) -> Result<Vec<Category>> {
        data_sources(ctx)?.categories.find_all().await.gql()
    }
}
