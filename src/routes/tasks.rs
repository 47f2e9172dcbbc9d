use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::app::AppState;
use crate::authz::{self, guards, AccessRequest, ProjectFacts, Role, TaskFacts, TaskOperation};
use crate::errors::{AppError, AppResult};
use crate::events::{self, AuditAction};
use crate::jwt::AuthUser;
use crate::models::task::{
    AssignTaskRequest, DbTask, Task, TaskCreateRequest, TaskListQuery, TaskStatusRequest, TaskTagsRequest,
    TaskUpdateRequest,
};
use crate::models::TaskStatus;
use crate::routes::projects::load_project;
use crate::utils::{required_text, utc_now};

const TASK_SELECT: &str = "SELECT t.id, t.project_id, p.name AS project_name, p.creator_id AS project_creator_id, \
     t.title, t.description, t.priority, t.due_date, t.status, t.creator_id, t.assigned_user_id, \
     a.first_name AS assignee_first_name, a.last_name AS assignee_last_name, t.created_at, t.updated_at \
     FROM tasks t JOIN projects p ON p.id = t.project_id LEFT JOIN users a ON a.id = t.assigned_user_id";

/// A task together with the ownership facts used to authorize it.
pub(crate) struct LoadedTask {
    pub facts: TaskFacts,
    pub task: Task,
}

#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    params(TaskListQuery),
    responses((status = 200, description = "Tasks visible to the caller", body = [Task]))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TaskListQuery>,
) -> AppResult<Json<Vec<Task>>> {
    let principal = &auth.principal;
    let user_id = auth.user_id();

    let rows = match query.project_id {
        Some(project_id) if principal.has_any_role(&[Role::Admin, Role::Manager]) => {
            let sql = format!("{TASK_SELECT} WHERE t.project_id = ? ORDER BY t.id");
            sqlx::query_as::<_, DbTask>(&sql).bind(project_id).fetch_all(&state.pool).await?
        }
        Some(project_id) => {
            let sql = format!("{TASK_SELECT} WHERE t.project_id = ? AND t.assigned_user_id = ? ORDER BY t.id");
            sqlx::query_as::<_, DbTask>(&sql)
                .bind(project_id)
                .bind(user_id)
                .fetch_all(&state.pool)
                .await?
        }
        None if principal.is_admin() => {
            let sql = format!("{TASK_SELECT} ORDER BY t.id");
            sqlx::query_as::<_, DbTask>(&sql).fetch_all(&state.pool).await?
        }
        None if principal.has_role(Role::Manager) => {
            let sql = format!("{TASK_SELECT} WHERE p.creator_id = ? ORDER BY t.id");
            sqlx::query_as::<_, DbTask>(&sql).bind(user_id).fetch_all(&state.pool).await?
        }
        None => {
            let sql = format!("{TASK_SELECT} WHERE t.assigned_user_id = ? ORDER BY t.id");
            sqlx::query_as::<_, DbTask>(&sql).bind(user_id).fetch_all(&state.pool).await?
        }
    };

    let mut tasks = Vec::with_capacity(rows.len());
    for row in rows {
        let tags = fetch_tags(&state.pool, row.id).await?;
        tasks.push(row.into_task(tags)?);
    }

    Ok(Json(tasks))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/tasks",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    params(("project_id" = i64, Path, description = "Project id")),
    request_body = TaskCreateRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Invalid status, unknown tag, or assignee outside the project"),
        (status = 403, description = "Caller does not own the project"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<i64>,
    Json(payload): Json<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let project = load_project(&state.pool, project_id).await?;
    let facts = project.facts();
    authz::require(&auth.principal, AccessRequest::create_task_in(&facts))?;

    let title = required_text(&payload.title, "title")?;
    let status = match payload.status.as_deref() {
        Some(raw) => raw.parse::<TaskStatus>()?,
        None => TaskStatus::default(),
    };
    let assignee = payload.assigned_user_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
    if let Some(assignee) = assignee {
        ensure_project_member(&facts, assignee)?;
    }
    let tag_ids = dedup_tag_ids(payload.tag_ids.as_deref().unwrap_or_default());
    ensure_tags_exist(&state.pool, &tag_ids).await?;

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    let task_id: i64 = sqlx::query_scalar(
        "INSERT INTO tasks (project_id, title, description, priority, due_date, status, creator_id, assigned_user_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(project_id)
    .bind(&title)
    .bind(&payload.description)
    .bind(&payload.priority)
    .bind(payload.due_date)
    .bind(status.label())
    .bind(auth.user_id())
    .bind(assignee)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    attach_tags(&mut tx, task_id, &tag_ids).await?;
    tx.commit().await?;

    let loaded = load_task(&state.pool, task_id).await?;
    tracing::info!(task_id, project_id, actor = %auth.user_id(), "task created");
    events::record(&state.event_bus, AuditAction::Created, &auth.audit_context(), &loaded.task, None);

    Ok((StatusCode::CREATED, Json(loaded.task)))
}

#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task detail", body = Task),
        (status = 403, description = "Caller may not view this task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn get_task(State(state): State<AppState>, auth: AuthUser, Path(id): Path<i64>) -> AppResult<Json<Task>> {
    let loaded = load_task(&state.pool, id).await?;
    authz::require(&auth.principal, AccessRequest::task(TaskOperation::View, &loaded.facts))?;
    Ok(Json(loaded.task))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Task id")),
    request_body = TaskUpdateRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 400, description = "Invalid status or unknown tag"),
        (status = 403, description = "Caller may not modify this task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<TaskUpdateRequest>,
) -> AppResult<Json<Task>> {
    let before = load_task(&state.pool, id).await?;
    authz::require(&auth.principal, AccessRequest::task(TaskOperation::Update, &before.facts))?;

    let current = &before.task;
    let title = match payload.title.as_deref() {
        Some(title) => required_text(title, "title")?,
        None => current.title.clone(),
    };
    let status = match payload.status.as_deref() {
        Some(raw) => raw.parse::<TaskStatus>()?,
        None => current.status,
    };
    let description = payload.description.clone().or_else(|| current.description.clone());
    let priority = payload.priority.clone().or_else(|| current.priority.clone());
    let due_date = payload.due_date.or(current.due_date);

    let replacement_tags = match payload.tag_ids.as_deref() {
        Some(ids) => {
            let ids = dedup_tag_ids(ids);
            ensure_tags_exist(&state.pool, &ids).await?;
            Some(ids)
        }
        None => None,
    };

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, priority = ?, due_date = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&title)
    .bind(&description)
    .bind(&priority)
    .bind(due_date)
    .bind(status.label())
    .bind(utc_now())
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if let Some(tag_ids) = replacement_tags {
        sqlx::query("DELETE FROM task_tags WHERE task_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        attach_tags(&mut tx, id, &tag_ids).await?;
    }

    tx.commit().await?;

    let after = load_task(&state.pool, id).await?;
    events::record(&state.event_bus, AuditAction::Updated, &auth.audit_context(), &after.task, Some(&before.task));

    Ok(Json(after.task))
}

#[utoipa::path(
    post,
    path = "/tasks/{id}/assign",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Task id")),
    request_body = AssignTaskRequest,
    responses(
        (status = 200, description = "Task reassigned", body = Task),
        (status = 400, description = "New assignee is not a project member"),
        (status = 403, description = "Caller may not modify this task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn assign_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<AssignTaskRequest>,
) -> AppResult<Json<Task>> {
    let before = load_task(&state.pool, id).await?;
    authz::require(&auth.principal, AccessRequest::task(TaskOperation::Update, &before.facts))?;

    let assignee = payload.user_id.trim();
    let project = load_project(&state.pool, before.task.project_id).await?;
    ensure_project_member(&project.facts(), assignee)?;

    sqlx::query("UPDATE tasks SET assigned_user_id = ?, updated_at = ? WHERE id = ?")
        .bind(assignee)
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    let after = load_task(&state.pool, id).await?;
    tracing::info!(task_id = id, from = ?before.task.assigned_user_id, to = %assignee, "task reassigned");
    events::record(&state.event_bus, AuditAction::Assigned, &auth.audit_context(), &after.task, Some(&before.task));

    Ok(Json(after.task))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}/status",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Task id")),
    request_body = TaskStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = Task),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Caller may not modify this task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<TaskStatusRequest>,
) -> AppResult<Json<Task>> {
    let before = load_task(&state.pool, id).await?;
    authz::require(&auth.principal, AccessRequest::task(TaskOperation::Update, &before.facts))?;

    let status: TaskStatus = payload.status.parse()?;

    sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.label())
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    let after = load_task(&state.pool, id).await?;
    events::record(&state.event_bus, AuditAction::StatusChanged, &auth.audit_context(), &after.task, Some(&before.task));

    Ok(Json(after.task))
}

#[utoipa::path(
    post,
    path = "/tasks/{id}/tags",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Task id")),
    request_body = TaskTagsRequest,
    responses(
        (status = 200, description = "Tags added; ones already present are ignored", body = Task),
        (status = 400, description = "Unknown tag"),
        (status = 403, description = "Caller may not modify this task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn add_tags(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<TaskTagsRequest>,
) -> AppResult<Json<Task>> {
    let before = load_task(&state.pool, id).await?;
    authz::require(&auth.principal, AccessRequest::task(TaskOperation::Update, &before.facts))?;

    let tag_ids = dedup_tag_ids(&payload.tag_ids);
    ensure_tags_exist(&state.pool, &tag_ids).await?;

    let mut tx = state.pool.begin().await?;
    attach_tags(&mut tx, id, &tag_ids).await?;
    sqlx::query("UPDATE tasks SET updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let after = load_task(&state.pool, id).await?;
    events::record(&state.event_bus, AuditAction::TagsAdded, &auth.audit_context(), &after.task, Some(&before.task));

    Ok(Json(after.task))
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "Tasks",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 400, description = "Task is in progress"),
        (status = 403, description = "Caller may not delete this task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn delete_task(State(state): State<AppState>, auth: AuthUser, Path(id): Path<i64>) -> AppResult<StatusCode> {
    let loaded = load_task(&state.pool, id).await?;
    // In Progress blocks deletion for every caller, Admin included.
    guards::ensure_task_deletable(loaded.task.status)?;
    authz::require(&auth.principal, AccessRequest::task(TaskOperation::Delete, &loaded.facts))?;

    let affected = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("task not found"));
    }

    tracing::info!(task_id = id, actor = %auth.user_id(), "task deleted");
    events::record_deleted(&state.event_bus, &auth.audit_context(), &loaded.task);

    Ok(StatusCode::NO_CONTENT)
}

/// Loads a task with its tags and authorization facts, or 404.
pub(crate) async fn load_task(pool: &SqlitePool, task_id: i64) -> AppResult<LoadedTask> {
    let sql = format!("{TASK_SELECT} WHERE t.id = ?");
    let row = sqlx::query_as::<_, DbTask>(&sql)
        .bind(task_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("task not found"))?;

    let facts = row.facts();
    let tags = fetch_tags(pool, task_id).await?;
    let task = row.into_task(tags)?;
    Ok(LoadedTask { facts, task })
}

async fn fetch_tags(pool: &SqlitePool, task_id: i64) -> AppResult<Vec<(i64, String)>> {
    Ok(sqlx::query_as::<_, (i64, String)>(
        "SELECT tg.id, tg.name FROM task_tags tt JOIN tags tg ON tg.id = tt.tag_id WHERE tt.task_id = ? ORDER BY tg.name",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?)
}

fn dedup_tag_ids(ids: &[i64]) -> Vec<i64> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

async fn ensure_tags_exist(pool: &SqlitePool, tag_ids: &[i64]) -> AppResult<()> {
    for tag_id in tag_ids {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM tags WHERE id = ?")
            .bind(tag_id)
            .fetch_optional(pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::bad_request(format!("tag {tag_id} does not exist")));
        }
    }
    Ok(())
}

async fn attach_tags(tx: &mut Transaction<'_, Sqlite>, task_id: i64, tag_ids: &[i64]) -> AppResult<()> {
    for tag_id in tag_ids {
        sqlx::query("INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

fn ensure_project_member(project: &ProjectFacts, user_id: &str) -> AppResult<()> {
    if project.is_member(user_id) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!("user {user_id} is not a member of this project")))
    }
}
