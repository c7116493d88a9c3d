use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::components::comment_list::{CommentEdge, CommentItem, CommentListProps};
use crate::data_sources::DataSources;
use crate::db::format_timestamp;
use crate::db::models::Comment;
use crate::db::pagination::{ConnectionArgs, Page};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    pub first: Option<u32>,
    pub after: Option<String>,
}

async fn to_edges(data_sources: &DataSources, page: &Page<Comment>) -> AppResult<Vec<CommentEdge>> {
    let authors = futures::future::try_join_all(
        page.edges
            .iter()
            .map(|edge| data_sources.users.find_by_id(&edge.node.user_id)),
    )
    .await?;

    Ok(page
        .edges
        .iter()
        .zip(authors)
        .map(|(edge, author)| CommentEdge {
            cursor: edge.cursor.clone(),
            comment: CommentItem {
                id: edge.node.id.clone(),
                author_name: author
                    .map(|u| u.display_name)
                    .unwrap_or_else(|| "Deleted user".to_string()),
                content: edge.node.content.clone(),
                created_at: format_timestamp(&edge.node.created_at),
            },
        })
        .collect())
}

/// GET /posts/{id}/comments: one page of the comment list fragment
async fn comment_list(
    State(state): State<AppState>,
    data_sources: DataSources,
    Path(post_id): Path<String>,
    Query(query): Query<CommentsQuery>,
) -> AppResult<Html<String>> {
    if data_sources.posts.find_by_id(&post_id).await?.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    // Zero would render an empty page with no sentinel
    let first = query.first.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE);
    let args = ConnectionArgs::new(first, query.after);
    let loaded = match data_sources
        .comments
        .find_connection_by_post_id(&post_id, &args)
        .await
    {
        Ok(page) => to_edges(&data_sources, &page)
            .await
            .map(|edges| (edges, page.has_next_page, page.end_cursor().map(String::from))),
        Err(e) => Err(e),
    };

    // Load failures are shown inline so the already rendered list stays usable
    let props = match loaded {
        Ok((edges, has_next_page, end_cursor)) => CommentListProps {
            edges,
            has_next_page,
            loading: false,
            error: None,
            fetch_more_url: end_cursor.filter(|_| has_next_page).map(|cursor| {
                format!("/posts/{}/comments?first={}&after={}", post_id, first, cursor)
            }),
        },
        Err(e) => {
            tracing::warn!(post_id = %post_id, error = %e, "Failed to load comments");
            CommentListProps {
                error: Some(state.masking.body(&e).message),
                ..CommentListProps::default()
            }
        }
    };

    let html = state
        .comment_list
        .lock()
        .await
        .render(&props)
        .map_err(|e| AppError::Internal(format!("Template render error: {}", e)))?;
    Ok(Html(html))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/posts/{id}/comments", get(comment_list))
}
