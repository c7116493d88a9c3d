//! Keyset ("cursor") pagination over a single table.
//!
//! Rows are ordered by `(order column, id)`; the cursor of an edge records both
//! values so that the next page starts strictly after it, even when several
//! rows share the same order value.

use async_graphql::connection::{Connection, Edge};
use async_graphql::OutputType;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Row};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Position of a row in an ordered result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "v")]
    pub value: String,
    pub id: String,
}

impl Cursor {
    pub fn new(value: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            id: id.into(),
        }
    }

    /// Opaque, URL-safe string form handed to clients.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(cursor: &str) -> AppResult<Self> {
        let invalid = || AppError::BadRequest("Invalid cursor".to_string());
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor.trim().as_bytes())
            .map_err(|_| invalid())?;
        serde_json::from_slice(&bytes).map_err(|_| invalid())
    }
}

/// Rows that can be paginated know their own cursor.
pub trait CursorNode {
    fn cursor(&self) -> Cursor;
}

/// `first` / `after` arguments of a connection field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionArgs {
    pub first: u32,
    pub after: Option<String>,
}

impl ConnectionArgs {
    pub fn new(first: u32, after: Option<String>) -> Self {
        Self { first, after }
    }

    pub fn limit(&self) -> u32 {
        self.first.min(MAX_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    fn keyword(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }

    fn comparator(self) -> &'static str {
        match self {
            OrderDirection::Asc => ">",
            OrderDirection::Desc => "<",
        }
    }
}

/// Describes what to paginate: table, selected columns, ordering and filter.
#[derive(Debug, Clone)]
pub struct ConnectionQuery<'a> {
    table: &'a str,
    columns: &'a str,
    order_by: &'a str,
    direction: OrderDirection,
    filter: Option<String>,
    params: Vec<Value>,
}

impl<'a> ConnectionQuery<'a> {
    pub fn new(table: &'a str, columns: &'a str, order_by: &'a str) -> Self {
        Self {
            table,
            columns,
            order_by,
            direction: OrderDirection::Asc,
            filter: None,
            params: Vec::new(),
        }
    }

    pub fn direction(mut self, direction: OrderDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Restrict rows with a SQL predicate using positional `?` parameters.
    pub fn filter(mut self, clause: impl Into<String>, params: Vec<Value>) -> Self {
        self.filter = Some(clause.into());
        self.params = params;
        self
    }

    fn sql(&self, has_cursor: bool) -> String {
        let mut conditions = Vec::new();
        if let Some(filter) = &self.filter {
            conditions.push(format!("({})", filter));
        }
        if has_cursor {
            conditions.push(format!(
                "({}, id) {} (?, ?)",
                self.order_by,
                self.direction.comparator()
            ));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let dir = self.direction.keyword();
        format!(
            "SELECT {} FROM {}{} ORDER BY {} {}, id {} LIMIT ?",
            self.columns, self.table, where_clause, self.order_by, dir, dir
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageEdge<T> {
    pub cursor: String,
    pub node: T,
}

/// One page of a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub edges: Vec<PageEdge<T>>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            edges: self
                .edges
                .into_iter()
                .map(|edge| PageEdge {
                    cursor: edge.cursor,
                    node: f(edge.node),
                })
                .collect(),
            has_next_page: self.has_next_page,
            has_previous_page: self.has_previous_page,
        }
    }

    pub fn end_cursor(&self) -> Option<&str> {
        self.edges.last().map(|edge| edge.cursor.as_str())
    }
}

impl<T: OutputType> Page<T> {
    pub fn into_connection(self) -> Connection<String, T> {
        let mut connection = Connection::new(self.has_previous_page, self.has_next_page);
        connection.edges.extend(
            self.edges
                .into_iter()
                .map(|edge| Edge::new(edge.cursor, edge.node)),
        );
        connection
    }
}

/// Fetch one page of `query`, starting strictly after `args.after`.
///
/// One extra row is read to decide `has_next_page`.
pub fn find_connection<T, F>(
    conn: &rusqlite::Connection,
    query: &ConnectionQuery<'_>,
    args: &ConnectionArgs,
    map_row: F,
) -> AppResult<Page<T>>
where
    T: CursorNode,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let after = args.after.as_deref().map(Cursor::decode).transpose()?;
    let limit = args.limit() as usize;

    let mut params = query.params.clone();
    if let Some(cursor) = &after {
        params.push(Value::Text(cursor.value.clone()));
        params.push(Value::Text(cursor.id.clone()));
    }
    params.push(Value::Integer(limit as i64 + 1));

    let mut stmt = conn.prepare(&query.sql(after.is_some()))?;
    let mut nodes = stmt
        .query_map(params_from_iter(params.iter()), map_row)?
        .collect::<Result<Vec<T>, _>>()?;

    let has_next_page = nodes.len() > limit;
    nodes.truncate(limit);

    let edges = nodes
        .into_iter()
        .map(|node| PageEdge {
            cursor: node.cursor().encode(),
            node,
        })
        .collect();

    Ok(Page {
        edges,
        has_next_page,
        has_previous_page: after.is_some(),
    })
}
