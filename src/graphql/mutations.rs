use async_graphql::*;

use crate::auth::SocialAccountType;
use crate::db::models::{Comment, Post, Reaction, ReactionType, User};
use crate::graphql::types::{
    data_sources, CreateCommentInput, CreatePostInput, ResultExt, UserInput,
};

/// GraphQL Mutation root
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn create_post(&self, ctx: &Context<'_>, input: CreatePostInput) -> Result<Post> {
        data_sources(ctx)?.posts.create(&input).await.gql()
    }

    async fn delete_post(&self, ctx: &Context<'_>, id: ID) -> Result<bool> {
        data_sources(ctx)?.posts.delete(&id).await.gql()
    }

    async fn create_comment(
        &self,
        ctx: &Context<'_>,
        input: CreateCommentInput,
    ) -> Result<Comment> {
        data_sources(ctx)?.comments.create(&input).await.gql()
    }

    async fn delete_comment(&self, ctx: &Context<'_>, id: ID) -> Result<bool> {
        data_sources(ctx)?.comments.delete(&id).await.gql()
    }

    /// React to a post or comment; replaces the viewer's previous reaction
    async fn react(
        &self,
        ctx: &Context<'_>,
        reactable_id: ID,
        #[graphql(name = "type")] kind: ReactionType,
    ) -> Result<Reaction> {
        data_sources(ctx)?
            .reactions
            .react(&reactable_id, kind)
            .await
            .gql()
    }

    async fn unreact(&self, ctx: &Context<'_>, reactable_id: ID) -> Result<bool> {
        data_sources(ctx)?.reactions.unreact(&reactable_id).await.gql()
    }

    async fn update_user(&self, ctx: &Context<'_>, id: ID, input: UserInput) -> Result<User> {
        data_sources(ctx)?.users.update(&id, &input).await.gql()
    }

    /// Log out every session of the viewer except the current one
    async fn delete_viewer_sessions(&self, ctx: &Context<'_>) -> Result<bool> {
        data_sources(ctx)?
            .auth_tokens
            .delete_all_except_current()
            .await
            .gql()
    }

    /// Log out one session of the viewer
    async fn delete_viewer_session(&self, ctx: &Context<'_>, id: ID) -> Result<bool> {
        data_sources(ctx)?.auth_tokens.delete_by_jti(&id).await.gql()
    }

    async fn link_viewer_social_account(
        &self,
        ctx: &Context<'_>,
        social_account_type: SocialAccountType,
        token: String,
    ) -> Result<User> {
        data_sources(ctx)?
            .users
            .link_viewer_social_account(social_account_type, &token)
            .await
            .gql()
    }

    async fn unlink_viewer_social_account(
        &self,
        ctx: &Context<'_>,
        social_account_type: SocialAccountType,
    ) -> Result<User> {
        data_sources(ctx)?
            .users
            .unlink_viewer_social_account(social_account_type)
            .await
            .gql()
    }
}
