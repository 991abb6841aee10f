use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Shown in place of the body of a soft-deleted post.
pub const DELETED_PLACEHOLDER: &str = "[this post has been removed]";

/// Lifecycle state of a post.
///
/// Soft-deleted posts stay in the read path and are marked, rather than
/// being filtered out or having their content column rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PostState {
    Active,
    Deleted { reason: String },
}

/// A row from the 'posts' table joined with the author's username.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Post {
    pub id: i64,
    pub thread_id: i64,
    pub author_id: i64,
    pub author_username: String,

    /// NULL means top-level; otherwise the id of the post replied to.
    pub parent_post_id: Option<i64>,

    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub delete_reason: Option<String>,
}

impl Post {
    pub fn state(&self) -> PostState {
        match self.deleted_at {
            Some(_) => PostState::Deleted {
                reason: self
                    .delete_reason
                    .clone()
                    .unwrap_or_else(|| "removed".to_string()),
            },
            None => PostState::Active,
        }
    }

    /// Body as it should be displayed. Deleted posts keep their stored
    /// content but never expose it.
    pub fn visible_content(&self) -> &str {
        if self.deleted_at.is_some() {
            DELETED_PLACEHOLDER
        } else {
            &self.content
        }
    }
}

/// Represents the 'post_likes' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PostLike {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub liked_at: DateTime<Utc>,
}

/// DTO for replying in a thread.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Reply must be between 1 and 10000 characters"
    ))]
    pub content: String,

    /// Optional: the ID of the post being replied to.
    pub parent_post_id: Option<i64>,
}

/// DTO for editing a post's content.
#[derive(Debug, Deserialize, Validate)]
pub struct EditPostRequest {
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content must be between 1 and 10000 characters"
    ))]
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(deleted: bool, reason: Option<&str>) -> Post {
        Post {
            id: 1,
            thread_id: 1,
            author_id: 1,
            author_username: "alice".to_string(),
            parent_post_id: None,
            content: "hello".to_string(),
            created_at: Utc::now(),
            edited_at: None,
            deleted_at: deleted.then(Utc::now),
            delete_reason: reason.map(str::to_string),
        }
    }

    #[test]
    fn active_post_shows_its_content() {
        let p = post(false, None);
        assert_eq!(p.state(), PostState::Active);
        assert_eq!(p.visible_content(), "hello");
    }

    #[test]
    fn deleted_post_hides_content_and_carries_reason() {
        let p = post(true, Some("removed by author"));
        assert_eq!(
            p.state(),
            PostState::Deleted {
                reason: "removed by author".to_string()
            }
        );
        assert_eq!(p.visible_content(), DELETED_PLACEHOLDER);
    }
}
