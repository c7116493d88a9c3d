//! Per-request repositories.
//!
//! A [`DataSources`] is built for every request. All repositories in it share
//! the same loaders and the same [`RequestContext`], so a lookup made by one
//! resolver is served from cache for every other resolver of that request.

pub mod auth_token;
pub mod category;
pub mod comment;
pub mod media;
pub mod post;
pub mod reaction;
pub mod user;

use std::sync::Arc;

use crate::auth::{Claims, SocialProvider, TokenKeys};
use crate::db::loaders::Loaders;
use crate::db::models::User;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

pub use auth_token::{AuthTokenRepository, NewAuthToken};
pub use category::CategoryRepository;
pub use comment::CommentRepository;
pub use media::MediaRepository;
pub use post::PostRepository;
pub use reaction::ReactionRepository;
pub use user::UserRepository;

pub const NOT_LOGGED_IN: &str = "You are not logged in";
pub const NOT_ALLOWED: &str = "Not allowed to do that";

/// Process-wide collaborators the repositories need besides the database.
#[derive(Clone)]
pub struct Services {
    pub tokens: TokenKeys,
    pub social: Arc<dyn SocialProvider>,
}

/// Who is asking.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub viewer: Option<User>,
    /// Raw token the viewer authenticated with
    pub auth_token: Option<String>,
    pub claims: Option<Claims>,
}

impl RequestContext {
    pub fn require_viewer(&self) -> AppResult<&User> {
        self.viewer
            .as_ref()
            .ok_or_else(|| AppError::Unauthenticated(NOT_LOGGED_IN.to_string()))
    }

    /// `jti` of the token used for this request.
    pub fn current_jti(&self) -> Option<&str> {
        self.claims.as_ref().map(|c| c.jti.as_str())
    }
}

/// State shared by every repository of one request.
#[derive(Clone)]
pub(crate) struct Base {
    pub pool: DbPool,
    pub loaders: Arc<Loaders>,
    pub context: Arc<RequestContext>,
    pub services: Services,
}

#[derive(Clone)]
pub struct DataSources {
    pub auth_tokens: AuthTokenRepository,
    pub categories: CategoryRepository,
    pub comments: CommentRepository,
    pub media: MediaRepository,
    pub posts: PostRepository,
    pub reactions: ReactionRepository,
    pub users: UserRepository,
    context: Arc<RequestContext>,
}

impl DataSources {
    pub fn new(pool: DbPool, services: Services, context: RequestContext) -> Self {
        let loaders = Arc::new(Loaders::new(&pool));
        Self::with_loaders(pool, services, loaders, context)
    }

    fn with_loaders(
        pool: DbPool,
        services: Services,
        loaders: Arc<Loaders>,
        context: RequestContext,
    ) -> Self {
        let base = Base {
            pool,
            loaders,
            context: Arc::new(context),
            services,
        };
        Self {
            auth_tokens: AuthTokenRepository::new(base.clone()),
            categories: CategoryRepository::new(base.clone()),
            comments: CommentRepository::new(base.clone()),
            media: MediaRepository::new(base.clone()),
            posts: PostRepository::new(base.clone()),
            reactions: ReactionRepository::new(base.clone()),
            users: UserRepository::new(base.clone()),
            context: base.context,
        }
    }

    /// Resolve the viewer from a bearer token.
    ///
    /// Any token problem (malformed, expired, revoked, unknown user) yields an
    /// anonymous context instead of an error.
    pub async fn for_request(pool: DbPool, services: Services, token: Option<String>) -> Self {
        let loaders = Arc::new(Loaders::new(&pool));
        let anonymous = Self::with_loaders(
            pool.clone(),
            services.clone(),
            loaders.clone(),
            RequestContext::default(),
        );

        let Some(token) = token else {
            return anonymous;
        };
        let Some(claims) = anonymous.auth_tokens.verify_and_decode(&token).await else {
            tracing::debug!("Ignoring invalid or revoked token");
            return anonymous;
        };
        let viewer = match anonymous.users.find_by_id(&claims.sub).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(user_id = %claims.sub, "Token refers to a missing user");
                return anonymous;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load viewer");
                return anonymous;
            }
        };

        let context = RequestContext {
            viewer: Some(viewer),
            auth_token: Some(token),
            claims: Some(claims),
        };
        Self::with_loaders(pool, services, loaders, context)
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn viewer(&self) -> Option<&User> {
        self.context.viewer.as_ref()
    }
}
