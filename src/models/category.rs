use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'categories' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
}

/// Listing row: category plus its thread count.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CategorySummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub thread_count: i64,
}

/// DTO for creating a category. Admin only.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Title must be between 1 and 100 characters"
    ))]
    pub title: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    #[serde(default)]
    pub description: String,
}

/// DTO for updating a category. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}
