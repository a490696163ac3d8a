use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of a microCMS list response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub contents: Vec<T>,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Eyecatch {
    pub url: String,
}

/// A blog post. `body` and `updated_at` are only present on detail reads;
/// list reads request a reduced field set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub category: Category,
    #[serde(default)]
    pub eyecatch: Option<Eyecatch>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub name: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
    pub parent_id: String,
}

/// Payload for creating a comment. Both strings are non-empty and trimmed
/// by the time one of these exists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub name: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
    pub parent_id: String,
}
