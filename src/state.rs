use std::sync::Arc;

use tokio::sync::Mutex;

use crate::components::comment_list::{CommentListProps, MemoComponent};
use crate::config::Config;
use crate::data_sources::Services;
use crate::db::DbPool;
use crate::error::ErrorMasking;
use crate::graphql::AgoraSchema;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub services: Services,
    pub masking: ErrorMasking,
    pub graphql_schema: AgoraSchema,
    pub comment_list: Arc<Mutex<MemoComponent<CommentListProps>>>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, services: Services) -> Self {
        Self {
            db,
            masking: ErrorMasking::new(&config.errors.sensitive_patterns),
            config,
            services,
            graphql_schema: crate::graphql::build_schema(),
            comment_list: Arc::new(Mutex::new(MemoComponent::new())),
        }
    }
}
