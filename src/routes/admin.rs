use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::authz::{self, Role};
use crate::db::users::{self, NewUser};
use crate::errors::{AppError, AppResult};
use crate::events::{self, AuditAction};
use crate::jwt::AuthUser;
use crate::models::user::{AdminCreateUserRequest, RoleUpdateRequest, User};

fn parse_role(raw: &str) -> AppResult<Role> {
    raw.parse::<Role>().map_err(|err| AppError::bad_request(err.to_string()))
}

#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    request_body = AdminCreateUserRequest,
    responses(
        (status = 201, description = "User created with the given role", body = User),
        (status = 400, description = "Unknown role or invalid credentials"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<AdminCreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    authz::require_any_role(&auth.principal, &[Role::Admin])?;
    let role = parse_role(&payload.role)?;

    let new_user = NewUser {
        email: payload.email,
        password: payload.password,
        first_name: payload.first_name,
        last_name: payload.last_name,
    };
    let user = users::create_user(&state.pool, &new_user, role).await?.into_user(vec![role]);

    events::record(&state.event_bus, AuditAction::Created, &auth.audit_context(), &user, None);
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All users with their primary role", body = [User]),
        (status = 403, description = "Admins and Managers only")
    )
)]
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<User>>> {
    authz::require_any_role(&auth.principal, &[Role::Admin, Role::Manager])?;

    let rows = users::list_users(&state.pool).await?;
    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        let roles = users::fetch_roles(&state.pool, &row.id).await?;
        result.push(row.into_user(roles));
    }

    Ok(Json(result))
}

#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Admins cannot delete themselves"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User still created projects")
    )
)]
pub async fn delete_user(State(state): State<AppState>, auth: AuthUser, Path(id): Path<String>) -> AppResult<StatusCode> {
    authz::require_any_role(&auth.principal, &[Role::Admin])?;

    let target = users::fetch_user(&state.pool, &id).await?;
    if auth.principal.is(&target.id) {
        return Err(AppError::bad_request("cannot delete your own account"));
    }

    let owned_projects: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM projects WHERE creator_id = ?")
        .bind(&target.id)
        .fetch_one(&state.pool)
        .await?;
    if owned_projects > 0 {
        return Err(AppError::conflict(format!("user created {owned_projects} project(s); delete them first")));
    }

    let roles = users::fetch_roles(&state.pool, &target.id).await?;
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&target.id)
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = %target.id, actor = %auth.user_id(), "user deleted");
    events::record_deleted(&state.event_bus, &auth.audit_context(), &target.into_user(roles));

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "User id")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role replaced; effective from the user's next login", body = User),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn change_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<RoleUpdateRequest>,
) -> AppResult<Json<User>> {
    authz::require_any_role(&auth.principal, &[Role::Admin])?;
    let role = parse_role(&payload.role)?;

    let target = users::fetch_user(&state.pool, &id).await?;
    let previous_roles = users::fetch_roles(&state.pool, &target.id).await?;

    users::replace_roles(&state.pool, &target.id, role).await?;

    let before = target.clone().into_user(previous_roles);
    let after = target.into_user(vec![role]);
    tracing::info!(user_id = %after.id, role = %role, "role changed");
    events::record(&state.event_bus, AuditAction::RoleChanged, &auth.audit_context(), &after, Some(&before));

    Ok(Json(after))
}
