use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::hierarchy::PostView;

/// Represents the 'threads' table, joined with the author's username.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Thread {
    pub id: i64,
    pub category_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub title: String,

    /// The opening message of the thread.
    pub content: String,

    pub view_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Listing row: thread metadata plus its reply count.
/// Soft-deleted replies are not counted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ThreadSummary {
    pub id: i64,
    pub category_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub title: String,
    pub view_count: i64,
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
}

/// DTO for opening a new thread.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateThreadRequest {
    #[validate(length(
        min = 5,
        max = 150,
        message = "Title must be between 5 and 150 characters"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content must be between 1 and 10000 characters"
    ))]
    pub content: String,

    pub category_id: i64,
}

/// Query parameters for listing threads in a category.
#[derive(Debug, Deserialize)]
pub struct ThreadListParams {
    /// Cursor for pagination: created_at of the last thread in the previous page.
    pub cursor: Option<DateTime<Utc>>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,
}

/// Thread detail response: the thread itself plus its reply forest.
#[derive(Debug, Serialize)]
pub struct ThreadDetail {
    pub thread: Thread,
    pub posts: Vec<PostView>,
}
