use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::db::pagination::{Cursor, CursorNode};
use crate::db::{format_timestamp, parse_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct User {
    #[graphql(skip)]
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub thumbnail_url: Option<String>,
    pub google_profile_id: Option<String>,
    pub facebook_profile_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, display_name, email, thumbnail_url, google_profile_id, facebook_profile_id, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            display_name: row.get(1)?,
            email: row.get(2)?,
            thumbnail_url: row.get(3)?,
            google_profile_id: row.get(4)?,
            facebook_profile_id: row.get(5)?,
            created_at: parse_timestamp(&row.get::<_, String>(6)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Category {
    #[graphql(skip)]
    pub id: String,
    pub name: String,
}

impl Category {
    pub const COLUMNS: &'static str = "id, name";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Post {
    #[graphql(skip)]
    pub id: String,
    #[graphql(skip)]
    pub user_id: String,
    #[graphql(skip)]
    pub category_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub const COLUMNS: &'static str = "id, user_id, category_id, content, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            category_id: row.get(2)?,
            content: row.get(3)?,
            created_at: parse_timestamp(&row.get::<_, String>(4)?),
            updated_at: parse_timestamp(&row.get::<_, String>(5)?),
        })
    }
}

impl CursorNode for Post {
    fn cursor(&self) -> Cursor {
        Cursor::new(format_timestamp(&self.created_at), &self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Media {
    #[graphql(skip)]
    pub id: String,
    #[graphql(skip)]
    pub post_id: String,
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    #[graphql(skip)]
    pub position: i32,
}

impl Media {
    pub const COLUMNS: &'static str = "id, post_id, url, width, height, position";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            url: row.get(2)?,
            width: row.get(3)?,
            height: row.get(4)?,
            position: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Comment {
    #[graphql(skip)]
    pub id: String,
    #[graphql(skip)]
    pub post_id: String,
    #[graphql(skip)]
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub const COLUMNS: &'static str = "id, post_id, user_id, content, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            user_id: row.get(2)?,
            content: row.get(3)?,
            created_at: parse_timestamp(&row.get::<_, String>(4)?),
        })
    }
}

impl CursorNode for Comment {
    fn cursor(&self) -> Cursor {
        Cursor::new(format_timestamp(&self.created_at), &self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum)]
pub enum ReactionType {
    Like,
    Love,
    Haha,
    Wow,
    Sad,
    Angry,
}

impl ReactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Like => "LIKE",
            ReactionType::Love => "LOVE",
            ReactionType::Haha => "HAHA",
            ReactionType::Wow => "WOW",
            ReactionType::Sad => "SAD",
            ReactionType::Angry => "ANGRY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LIKE" => Some(ReactionType::Like),
            "LOVE" => Some(ReactionType::Love),
            "HAHA" => Some(ReactionType::Haha),
            "WOW" => Some(ReactionType::Wow),
            "SAD" => Some(ReactionType::Sad),
            "ANGRY" => Some(ReactionType::Angry),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Reaction {
    #[graphql(skip)]
    pub id: String,
    #[graphql(skip)]
    pub reactable_id: String,
    #[graphql(skip)]
    pub user_id: String,
    #[graphql(name = "type")]
    pub kind: ReactionType,
    pub created_at: DateTime<Utc>,
}

impl Reaction {
    pub const COLUMNS: &'static str = "id, reactable_id, user_id, type, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let stored: String = row.get(3)?;
        let kind = ReactionType::parse(&stored).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Text,
                format!("unknown reaction type {:?}", stored).into(),
            )
        })?;
        Ok(Self {
            id: row.get(0)?,
            reactable_id: row.get(1)?,
            user_id: row.get(2)?,
            kind,
            created_at: parse_timestamp(&row.get::<_, String>(4)?),
        })
    }
}

/// A persisted login session: one row per issued JWT, keyed by its `jti`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
#[graphql(name = "Session", complex)]
pub struct AuthToken {
    #[graphql(skip)]
    pub id: String,
    /// Exposed as the session id; it is the handle used to revoke the session
    #[graphql(skip)]
    pub jti: String,
    #[graphql(skip)]
    pub user_id: String,
    pub browser: Option<String>,
    pub platform: Option<String>,
    pub os: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Whether this session belongs to the token of the current request
    pub is_current: bool,
}

impl AuthToken {
    pub const COLUMNS: &'static str = "id, jti, user_id, browser, platform, os, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            jti: row.get(1)?,
            user_id: row.get(2)?,
            browser: row.get(3)?,
            platform: row.get(4)?,
            os: row.get(5)?,
            created_at: parse_timestamp(&row.get::<_, String>(6)?),
            is_current: false,
        })
    }
}

impl CursorNode for AuthToken {
    fn cursor(&self) -> Cursor {
        Cursor::new(format_timestamp(&self.created_at), &self.id)
    }
}
