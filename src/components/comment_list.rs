//! Infinite-scroll comment list fragment.
//!
//! The fragment renders one item per edge and, while more pages exist, a
//! loading indicator. A sentinel element carrying the next-page URL is added
//! only when scrolling should trigger a fetch.

use askama::Template;

/// Something that renders to HTML from its own props.
pub trait Component {
    fn view(&self) -> Result<String, askama::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentItem {
    pub id: String,
    pub author_name: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEdge {
    pub cursor: String,
    pub comment: CommentItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentListProps {
    pub edges: Vec<CommentEdge>,
    pub has_next_page: bool,
    /// A fetch for the next page is in flight
    pub loading: bool,
    pub error: Option<String>,
    pub fetch_more_url: Option<String>,
}

impl CommentListProps {
    /// Infinite scroll is armed only without an error, with a next page and no fetch in flight.
    pub fn should_load_more(&self) -> bool {
        self.error.is_none() && self.has_next_page && !self.loading
    }
}

#[derive(Template)]
#[template(path = "components/comment_list.html")]
struct CommentListTemplate<'a> {
    edges: &'a [CommentEdge],
    load_more: bool,
    fetch_more_url: &'a str,
    has_next_page: bool,
    has_error: bool,
    error_message: &'a str,
}

impl Component for CommentListProps {
    fn view(&self) -> Result<String, askama::Error> {
        let fetch_more_url = self.fetch_more_url.as_deref().unwrap_or_default();
        CommentListTemplate {
            edges: &self.edges,
            load_more: self.should_load_more() && !fetch_more_url.is_empty(),
            fetch_more_url,
            has_next_page: self.has_next_page,
            has_error: self.error.is_some(),
            error_message: self.error.as_deref().unwrap_or_default(),
        }
        .render()
    }
}

/// Re-renders only when the props differ from the last rendered ones.
#[derive(Debug)]
pub struct MemoComponent<P> {
    last: Option<(P, String)>,
    renders: usize,
}

impl<P> Default for MemoComponent<P> {
    fn default() -> Self {
        Self {
            last: None,
            renders: 0,
        }
    }
}

impl<P: Component + Clone + PartialEq> MemoComponent<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, props: &P) -> Result<String, askama::Error> {
        if let Some((last, html)) = &self.last {
            if last == props {
                return Ok(html.clone());
            }
        }
        let html = props.view()?;
        self.renders += 1;
        self.last = Some((props.clone(), html.clone()));
        Ok(html)
    }

    /// How many times the wrapped component actually rendered.
    pub fn renders(&self) -> usize {
        self.renders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(n: usize) -> CommentEdge {
        CommentEdge {
            cursor: format!("cursor-{}", n),
            comment: CommentItem {
                id: format!("c{}", n),
                author_name: "Ada".to_string(),
                content: format!("comment <{}>", n),
                created_at: "2024-01-01T00:00:00.000Z".to_string(),
            },
        }
    }

    fn props(has_next_page: bool) -> CommentListProps {
        CommentListProps {
            edges: vec![edge(1), edge(2)],
            has_next_page,
            loading: false,
            error: None,
            fetch_more_url: Some("/posts/p1/comments?first=2&after=cursor-2".to_string()),
        }
    }

    #[test]
    fn load_more_is_armed_only_when_idle_without_error() {
        assert!(props(true).should_load_more());
        assert!(!props(false).should_load_more());
        assert!(!CommentListProps {
            loading: true,
            ..props(true)
        }
        .should_load_more());
        assert!(!CommentListProps {
            error: Some("boom".into()),
            ..props(true)
        }
        .should_load_more());
    }

    #[test]
    fn renders_items_sentinel_and_loading_indicator() {
        let html = props(true).view().unwrap();
        assert_eq!(html.matches("class=\"comment\"").count(), 2);
        assert!(html.contains("data-cursor=\"cursor-1\""));
        assert!(html.contains("data-load-more="));
        assert!(html.contains("comment-list-loading"));
        // Content is escaped
        assert!(html.contains("comment &lt;1&gt;"));
    }

    #[test]
    fn last_page_has_no_sentinel_or_loader() {
        let html = props(false).view().unwrap();
        assert!(!html.contains("data-load-more="));
        assert!(!html.contains("comment-list-loading"));
    }

    #[test]
    fn error_disarms_sentinel_but_keeps_loader() {
        let html = CommentListProps {
            error: Some("Something went wrong".into()),
            ..props(true)
        }
        .view()
        .unwrap();
        assert!(!html.contains("data-load-more="));
        assert!(html.contains("comment-list-loading"));
        assert!(html.contains("Something went wrong"));
    }

    #[test]
    fn memo_reuses_markup_for_equal_props() {
        let mut memo = MemoComponent::new();
        let first = memo.render(&props(true)).unwrap();
        let second = memo.render(&props(true)).unwrap();
        assert_eq!(first, second);
        assert_eq!(memo.renders(), 1);

        memo.render(&props(false)).unwrap();
        assert_eq!(memo.renders(), 2);
    }
}
