use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{self, guards, AccessRequest, ProjectOperation, Role};
use crate::db::users;
use crate::errors::{AppError, AppResult};
use crate::events::{self, AuditAction};
use crate::jwt::AuthUser;
use crate::models::project::{
    AddMemberRequest, DbProject, Project, ProjectCreateRequest, ProjectMember, ProjectUpdateRequest,
};
use crate::models::TaskStatus;
use crate::utils::{required_text, utc_now};

const DEFAULT_STATUS: &str = "Active";

const PROJECT_SELECT: &str = "SELECT p.id, p.name, p.description, p.start_date, p.end_date, p.status, p.creator_id, \
     u.first_name AS creator_first_name, p.created_at, p.updated_at \
     FROM projects p LEFT JOIN users u ON u.id = p.creator_id";

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Projects visible to the caller", body = [Project]))
)]
pub async fn list_projects(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Project>>> {
    let rows = if auth.principal.has_any_role(&[Role::Admin, Role::Manager]) {
        let sql = format!("{PROJECT_SELECT} ORDER BY p.created_at DESC");
        sqlx::query_as::<_, DbProject>(&sql).fetch_all(&state.pool).await?
    } else {
        let sql = format!(
            "{PROJECT_SELECT} WHERE p.creator_id = ? \
             OR EXISTS (SELECT 1 FROM project_members pm WHERE pm.project_id = p.id AND pm.user_id = ?) \
             ORDER BY p.created_at DESC"
        );
        sqlx::query_as::<_, DbProject>(&sql)
            .bind(auth.user_id())
            .bind(auth.user_id())
            .fetch_all(&state.pool)
            .await?
    };

    let mut projects = Vec::with_capacity(rows.len());
    for row in rows {
        let members = fetch_members(&state.pool, row.id).await?;
        projects.push(row.into_project(members));
    }

    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    security(("bearer_auth" = [])),
    request_body = ProjectCreateRequest,
    responses(
        (status = 201, description = "Project created, creator enrolled as member", body = Project),
        (status = 403, description = "Only Admins and Managers create projects")
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    authz::require_any_role(&auth.principal, &[Role::Admin, Role::Manager])?;

    let name = required_text(&payload.name, "name")?;
    let status = payload.status.as_deref().map(str::trim).filter(|s| !s.is_empty()).unwrap_or(DEFAULT_STATUS);
    let now = utc_now();

    let mut tx = state.pool.begin().await?;

    let project_id: i64 = sqlx::query_scalar(
        "INSERT INTO projects (name, description, start_date, end_date, status, creator_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&name)
    .bind(&payload.description)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(status)
    .bind(auth.user_id())
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO project_members (project_id, user_id) VALUES (?, ?)")
        .bind(project_id)
        .bind(auth.user_id())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let project = load_project(&state.pool, project_id).await?;
    tracing::info!(project_id, creator_id = %auth.user_id(), "project created");
    events::record(&state.event_bus, AuditAction::Created, &auth.audit_context(), &project, None);

    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail", body = Project),
        (status = 403, description = "Caller may not view this project"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project(State(state): State<AppState>, auth: AuthUser, Path(id): Path<i64>) -> AppResult<Json<Project>> {
    let project = load_project(&state.pool, id).await?;
    authz::require(&auth.principal, AccessRequest::project(ProjectOperation::View, &project.facts()))?;
    Ok(Json(project))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 403, description = "Caller does not own this project"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<ProjectUpdateRequest>,
) -> AppResult<Json<Project>> {
    let before = load_project(&state.pool, id).await?;
    authz::require(&auth.principal, AccessRequest::project(ProjectOperation::Update, &before.facts()))?;

    let name = match payload.name.as_deref() {
        Some(name) => required_text(name, "name")?,
        None => before.name.clone(),
    };
    let description = payload.description.clone().or_else(|| before.description.clone());
    let start_date = payload.start_date.or(before.start_date);
    let end_date = payload.end_date.or(before.end_date);
    let status = payload.status.clone().unwrap_or_else(|| before.status.clone());

    sqlx::query(
        "UPDATE projects SET name = ?, description = ?, start_date = ?, end_date = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(&description)
    .bind(start_date)
    .bind(end_date)
    .bind(&status)
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    let project = load_project(&state.pool, id).await?;
    events::record(&state.event_bus, AuditAction::Updated, &auth.audit_context(), &project, Some(&before));

    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "Projects",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project deleted with its tasks and comments"),
        (status = 400, description = "Project still has unfinished tasks"),
        (status = 403, description = "Caller does not own this project"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn delete_project(State(state): State<AppState>, auth: AuthUser, Path(id): Path<i64>) -> AppResult<StatusCode> {
    let project = load_project(&state.pool, id).await?;
    let statuses = task_statuses(&state.pool, "SELECT status FROM tasks WHERE project_id = ?", id, None).await?;
    guards::ensure_project_deletable(statuses)?;
    authz::require(&auth.principal, AccessRequest::project(ProjectOperation::Delete, &project.facts()))?;

    let affected = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("project not found"));
    }

    tracing::info!(project_id = id, actor = %auth.user_id(), "project deleted");
    events::record_deleted(&state.event_bus, &auth.audit_context(), &project);

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/projects/{id}/members",
    tag = "Projects",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Project id")),
    request_body = AddMemberRequest,
    responses(
        (status = 200, description = "Member added", body = Project),
        (status = 400, description = "User is already a member"),
        (status = 403, description = "Caller may not manage members"),
        (status = 404, description = "Project or user not found")
    )
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<AddMemberRequest>,
) -> AppResult<Json<Project>> {
    let before = load_project(&state.pool, id).await?;
    authz::require(&auth.principal, AccessRequest::project(ProjectOperation::ManageMembers, &before.facts()))?;

    let user = users::fetch_user(&state.pool, payload.user_id.trim()).await?;
    if before.members.iter().any(|member| member.user_id == user.id) {
        return Err(AppError::bad_request(format!("user {} is already a member of project {id}", user.id)));
    }

    sqlx::query("INSERT INTO project_members (project_id, user_id) VALUES (?, ?)")
        .bind(id)
        .bind(&user.id)
        .execute(&state.pool)
        .await?;

    let project = load_project(&state.pool, id).await?;
    events::record(&state.event_bus, AuditAction::MemberAdded, &auth.audit_context(), &project, Some(&before));

    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}/members/{user_id}",
    tag = "Projects",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Project id"),
        ("user_id" = String, Path, description = "Member user id")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 400, description = "Creator, or member still holding unfinished tasks"),
        (status = 403, description = "Caller may not manage members"),
        (status = 404, description = "Project not found or user is not a member")
    )
)]
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, user_id)): Path<(i64, String)>,
) -> AppResult<StatusCode> {
    let before = load_project(&state.pool, id).await?;
    let facts = before.facts();
    authz::require(&auth.principal, AccessRequest::project(ProjectOperation::ManageMembers, &facts))?;

    if !facts.is_member(&user_id) {
        return Err(AppError::not_found(format!("user {user_id} is not a member of project {id}")));
    }

    let held = task_statuses(
        &state.pool,
        "SELECT status FROM tasks WHERE project_id = ? AND assigned_user_id = ?",
        id,
        Some(&user_id),
    )
    .await?;
    guards::ensure_member_removable(&facts, &user_id, held)?;

    sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
        .bind(id)
        .bind(&user_id)
        .execute(&state.pool)
        .await?;

    let project = load_project(&state.pool, id).await?;
    events::record(&state.event_bus, AuditAction::MemberRemoved, &auth.audit_context(), &project, Some(&before));

    Ok(StatusCode::NO_CONTENT)
}

/// Loads a project with its member list, or 404.
pub(crate) async fn load_project(pool: &SqlitePool, project_id: i64) -> AppResult<Project> {
    let sql = format!("{PROJECT_SELECT} WHERE p.id = ?");
    let row = sqlx::query_as::<_, DbProject>(&sql)
        .bind(project_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("project not found"))?;

    let members = fetch_members(pool, project_id).await?;
    Ok(row.into_project(members))
}

async fn fetch_members(pool: &SqlitePool, project_id: i64) -> AppResult<Vec<ProjectMember>> {
    Ok(sqlx::query_as::<_, ProjectMember>(
        "SELECT u.id AS user_id, u.first_name, u.last_name, u.email \
         FROM project_members pm JOIN users u ON u.id = pm.user_id \
         WHERE pm.project_id = ? ORDER BY u.email",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?)
}

async fn task_statuses(pool: &SqlitePool, sql: &str, project_id: i64, user_id: Option<&str>) -> AppResult<Vec<TaskStatus>> {
    let mut query = sqlx::query_scalar::<_, String>(sql).bind(project_id);
    if let Some(user_id) = user_id {
        query = query.bind(user_id);
    }

    query
        .fetch_all(pool)
        .await?
        .iter()
        .map(|raw| raw.parse().map_err(|_| AppError::internal(format!("unknown stored task status {raw:?}"))))
        .collect()
}
