use axum::{Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{error::AppError, models::category::CategorySummary};

/// List all categories with their thread counts.
/// Public endpoint: this is the forum's landing view.
pub async fn list_categories(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let categories = sqlx::query_as::<_, CategorySummary>(
        r#"
        SELECT c.id, c.title, c.description, COUNT(t.id) AS thread_count
        FROM categories c
        LEFT JOIN threads t ON t.category_id = c.id
        GROUP BY c.id
        ORDER BY c.id
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list categories: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(categories))
}
