use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    hierarchy::{self, LikeIndex},
    models::{
        post::{CreatePostRequest, EditPostRequest, Post, PostLike},
        thread::{CreateThreadRequest, Thread, ThreadDetail, ThreadListParams, ThreadSummary},
    },
    policy::{self, Actor, Decision},
    utils::{
        html::clean_html,
        jwt::{Claims, optional_user_id},
    },
};

/// Helper struct for RETURNING id clauses.
#[derive(sqlx::FromRow)]
struct NewId {
    id: i64,
}

/// Helper struct for ownership lookups before edit/delete.
#[derive(sqlx::FromRow)]
struct PostOwner {
    author_id: i64,
    deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Open a new thread in a category.
/// Requires: Login.
pub async fn create_thread(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateThreadRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.sub.parse::<i64>().unwrap_or(0);

    let category = sqlx::query("SELECT id FROM categories WHERE id = $1")
        .bind(payload.category_id)
        .fetch_optional(&pool)
        .await?;
    if category.is_none() {
        return Err(AppError::NotFound("Category not found".to_string()));
    }

    let content = clean_html(&payload.content);

    let row: NewId = sqlx::query_as(
        r#"
        INSERT INTO threads (category_id, author_id, title, content)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(payload.category_id)
    .bind(user_id)
    .bind(&payload.title)
    .bind(&content)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create thread: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": row.id })),
    ))
}

/// List threads in a category (recent first).
/// Supports cursor-based pagination.
pub async fn list_threads(
    State(pool): State<PgPool>,
    Path(category_id): Path<i64>,
    Query(params): Query<ThreadListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).min(100); // Default 20, max 100

    let category = sqlx::query("SELECT id FROM categories WHERE id = $1")
        .bind(category_id)
        .fetch_optional(&pool)
        .await?;
    if category.is_none() {
        return Err(AppError::NotFound("Category not found".to_string()));
    }

    let threads = sqlx::query_as::<_, ThreadSummary>(
        r#"
        SELECT
            t.id, t.category_id, t.author_id, u.username AS author_username,
            t.title, t.view_count, COUNT(p.id) AS reply_count, t.created_at
        FROM threads t
        JOIN users u ON u.id = t.author_id
        LEFT JOIN posts p ON p.thread_id = t.id AND p.deleted_at IS NULL
        WHERE t.category_id = $1
          AND ($2::TIMESTAMPTZ IS NULL OR t.created_at < $2)
        GROUP BY t.id, u.username
        ORDER BY t.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(category_id)
    .bind(params.cursor)
    .bind(limit)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list threads: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(threads))
}

/// Thread detail: the thread plus its full reply forest.
///
/// Public endpoint; the viewer is resolved from an optional bearer token
/// so `user_has_liked` can be filled in. Soft-deleted posts are included
/// and marked. Increments the thread's view counter.
pub async fn thread_detail(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer_id = optional_user_id(&headers, &config.jwt_secret);

    let updated = sqlx::query("UPDATE threads SET view_count = view_count + 1 WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound("Thread not found".to_string()));
    }

    let thread = sqlx::query_as::<_, Thread>(
        r#"
        SELECT
            t.id, t.category_id, t.author_id, u.username AS author_username,
            t.title, t.content, t.view_count, t.created_at
        FROM threads t
        JOIN users u ON u.id = t.author_id
        WHERE t.id = $1
        "#,
    )
    .bind(id)
    .fetch_one(&pool)
    .await?;

    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT
            p.id, p.thread_id, p.author_id, u.username AS author_username,
            p.parent_post_id, p.content, p.created_at, p.edited_at,
            p.deleted_at, p.delete_reason
        FROM posts p
        JOIN users u ON u.id = p.author_id
        WHERE p.thread_id = $1
        ORDER BY p.created_at ASC
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let like_rows = sqlx::query_as::<_, PostLike>(
        r#"
        SELECT l.id, l.post_id, l.user_id, l.liked_at
        FROM post_likes l
        JOIN posts p ON p.id = l.post_id
        WHERE p.thread_id = $1
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let likes = LikeIndex::from_records(&like_rows);
    let posts = hierarchy::build(posts, &likes, viewer_id);

    Ok(Json(ThreadDetail { thread, posts }))
}

/// Reply in a thread, optionally nested under another post.
/// Requires: Login.
pub async fn add_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(thread_id): Path<i64>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);

    let mut tx = pool.begin().await?;

    let thread = sqlx::query("SELECT id FROM threads WHERE id = $1")
        .bind(thread_id)
        .fetch_optional(&mut *tx)
        .await?;
    if thread.is_none() {
        return Err(AppError::NotFound("Thread not found".to_string()));
    }

    // The parent must live in the same thread; replying to a deleted post
    // is allowed, the tree just shows the placeholder above the reply.
    if let Some(parent_id) = payload.parent_post_id {
        let parent = sqlx::query("SELECT id FROM posts WHERE id = $1 AND thread_id = $2")
            .bind(parent_id)
            .bind(thread_id)
            .fetch_optional(&mut *tx)
            .await?;
        if parent.is_none() {
            return Err(AppError::NotFound(
                "Parent post not found in this thread".to_string(),
            ));
        }
    }

    let content = clean_html(&payload.content);

    let row: NewId = sqlx::query_as(
        r#"
        INSERT INTO posts (thread_id, author_id, parent_post_id, content)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(thread_id)
    .bind(user_id)
    .bind(payload.parent_post_id)
    .bind(&content)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": row.id })),
    ))
}

/// Toggle Like on a post.
/// Requires: Login.
pub async fn toggle_like(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.sub.parse::<i64>().unwrap_or(0);

    let mut tx = pool.begin().await?;

    let post = sqlx::query("SELECT id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;
    if post.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    // Check if already liked
    let existing = sqlx::query("SELECT 1 AS one FROM post_likes WHERE user_id = $1 AND post_id = $2")
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;

    let is_liked = existing.is_some();

    if is_liked {
        // Unlike
        sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if e.to_string().contains("unique constraint") {
                    // Concurrent request handled gracefully
                    return AppError::Conflict("Already liked".to_string());
                }
                AppError::InternalServerError(e.to_string())
            })?;
    }

    tx.commit().await?;

    Ok(Json(serde_json::json!({ "liked": !is_liked })))
}

/// Edit a post's content.
/// Requires: Login + (Author OR Moderator OR Admin).
pub async fn edit_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<EditPostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let post = sqlx::query_as::<_, PostOwner>(
        "SELECT author_id, deleted_at FROM posts WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    if post.deleted_at.is_some() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let actor = Actor::from_claims(&claims);
    if policy::evaluate(&actor, post.author_id) == Decision::Deny {
        return Err(AppError::Forbidden(
            "You are not allowed to edit this post".to_string(),
        ));
    }

    let content = clean_html(&payload.content);

    sqlx::query("UPDATE posts SET content = $1, edited_at = NOW() WHERE id = $2")
        .bind(&content)
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to edit post: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::OK)
}

/// Delete a post (Soft Delete: the row stays, marked, content untouched).
/// Requires: Login + (Author OR Moderator OR Admin).
pub async fn delete_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = sqlx::query_as::<_, PostOwner>(
        "SELECT author_id, deleted_at FROM posts WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    if post.deleted_at.is_some() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let actor = Actor::from_claims(&claims);
    if policy::evaluate(&actor, post.author_id) == Decision::Deny {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this post".to_string(),
        ));
    }

    let reason = if actor.id == post.author_id {
        "removed by author"
    } else {
        "removed by a moderator"
    };

    sqlx::query("UPDATE posts SET deleted_at = NOW(), delete_reason = $1 WHERE id = $2")
        .bind(reason)
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete post: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}
