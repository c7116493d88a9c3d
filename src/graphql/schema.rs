use async_graphql::{EmptySubscription, Schema};

use super::mutations::MutationRoot;
use super::queries::QueryRoot;

/// GraphQL Schema type
pub type AgoraSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the GraphQL schema. Per-request `DataSources` are attached to each request.
pub fn build_schema() -> AgoraSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription).finish()
}
