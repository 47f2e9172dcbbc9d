use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{self, AccessRequest, CommentOperation, TaskOperation};
use crate::errors::{AppError, AppResult};
use crate::events::{self, AuditAction};
use crate::jwt::AuthUser;
use crate::models::comment::{Comment, CommentRequest};
use crate::routes::tasks::load_task;
use crate::utils::{required_text, utc_now};

const COMMENT_SELECT: &str = "SELECT c.id, c.task_id, c.content, c.author_id, \
     (u.first_name || ' ' || u.last_name) AS author_name, c.created_at, c.updated_at \
     FROM comments c LEFT JOIN users u ON u.id = c.author_id";

#[utoipa::path(
    get,
    path = "/tasks/{task_id}/comments",
    tag = "Comments",
    security(("bearer_auth" = [])),
    params(("task_id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Comments on the task, newest first", body = [Comment]),
        (status = 403, description = "Caller may not view the task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<i64>,
) -> AppResult<Json<Vec<Comment>>> {
    require_task_view(&state.pool, &auth, task_id).await?;

    let sql = format!("{COMMENT_SELECT} WHERE c.task_id = ? ORDER BY c.created_at DESC, c.id DESC");
    let comments = sqlx::query_as::<_, Comment>(&sql)
        .bind(task_id)
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(comments))
}

#[utoipa::path(
    post,
    path = "/tasks/{task_id}/comments",
    tag = "Comments",
    security(("bearer_auth" = [])),
    params(("task_id" = i64, Path, description = "Task id")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 403, description = "Caller may not view the task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    require_task_view(&state.pool, &auth, task_id).await?;
    let content = required_text(&payload.content, "content")?;

    let comment_id: i64 = sqlx::query_scalar(
        "INSERT INTO comments (task_id, author_id, content, created_at) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(task_id)
    .bind(auth.user_id())
    .bind(&content)
    .bind(utc_now())
    .fetch_one(&state.pool)
    .await?;

    let comment = load_comment(&state.pool, task_id, comment_id).await?;
    events::record(&state.event_bus, AuditAction::Created, &auth.audit_context(), &comment, None);

    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/tasks/{task_id}/comments/{id}",
    tag = "Comments",
    security(("bearer_auth" = [])),
    params(
        ("task_id" = i64, Path, description = "Task id"),
        ("id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 200, description = "Comment detail", body = Comment),
        (status = 403, description = "Caller may not view the task"),
        (status = 404, description = "Task or comment not found")
    )
)]
pub async fn get_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((task_id, id)): Path<(i64, i64)>,
) -> AppResult<Json<Comment>> {
    require_task_view(&state.pool, &auth, task_id).await?;
    Ok(Json(load_comment(&state.pool, task_id, id).await?))
}

#[utoipa::path(
    put,
    path = "/tasks/{task_id}/comments/{id}",
    tag = "Comments",
    security(("bearer_auth" = [])),
    params(
        ("task_id" = i64, Path, description = "Task id"),
        ("id" = i64, Path, description = "Comment id")
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Comment edited", body = Comment),
        (status = 403, description = "Only the author may edit"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((task_id, id)): Path<(i64, i64)>,
    Json(payload): Json<CommentRequest>,
) -> AppResult<Json<Comment>> {
    let before = load_comment(&state.pool, task_id, id).await?;
    authz::require(&auth.principal, AccessRequest::comment(CommentOperation::Edit, &before.facts()))?;

    let content = required_text(&payload.content, "content")?;
    sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
        .bind(&content)
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    let comment = load_comment(&state.pool, task_id, id).await?;
    events::record(&state.event_bus, AuditAction::Updated, &auth.audit_context(), &comment, Some(&before));

    Ok(Json(comment))
}

#[utoipa::path(
    delete,
    path = "/tasks/{task_id}/comments/{id}",
    tag = "Comments",
    security(("bearer_auth" = [])),
    params(
        ("task_id" = i64, Path, description = "Task id"),
        ("id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Only the author may delete"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((task_id, id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    let comment = load_comment(&state.pool, task_id, id).await?;
    authz::require(&auth.principal, AccessRequest::comment(CommentOperation::Delete, &comment.facts()))?;

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    events::record_deleted(&state.event_bus, &auth.audit_context(), &comment);
    Ok(StatusCode::NO_CONTENT)
}

async fn require_task_view(pool: &SqlitePool, auth: &AuthUser, task_id: i64) -> AppResult<()> {
    let loaded = load_task(pool, task_id).await?;
    authz::require(&auth.principal, AccessRequest::task(TaskOperation::View, &loaded.facts))
}

/// A comment is only found under the task it belongs to.
async fn load_comment(pool: &SqlitePool, task_id: i64, comment_id: i64) -> AppResult<Comment> {
    let sql = format!("{COMMENT_SELECT} WHERE c.id = ? AND c.task_id = ?");
    sqlx::query_as::<_, Comment>(&sql)
        .bind(comment_id)
        .bind(task_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("comment not found"))
}
