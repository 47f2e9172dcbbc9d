use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::Role;
use crate::db::users::{self, NewUser};
use crate::errors::{AppError, AppResult};
use crate::events::{self, AuditAction, AuditContext};
use crate::jwt::AuthUser;
use crate::models::user::{AuthResponse, LoginRequest, ProfileUpdateRequest, RegisterRequest, User};
use crate::utils::{required_text, utc_now, verify_password};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered as Member", body = AuthResponse),
        (status = 400, description = "Invalid email or password too short"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let new_user = NewUser {
        email: payload.email,
        password: payload.password,
        first_name: payload.first_name,
        last_name: payload.last_name,
    };
    let db_user = users::create_user(&state.pool, &new_user, Role::Member).await?;

    let roles = vec![Role::Member];
    let token = state.jwt.encode(&db_user.id, &db_user.email, &roles)?;
    let user = db_user.into_user(roles);

    let ctx = AuditContext {
        actor_id: Some(user.id.clone()),
        correlation_id: None,
    };
    events::record(&state.event_bus, AuditAction::Registered, &ctx, &user, None);

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> AppResult<Json<AuthResponse>> {
    let db_user = users::find_user_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        tracing::info!(user_id = %db_user.id, "login rejected");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let roles = users::fetch_roles(&state.pool, &db_user.id).await?;
    let token = state.jwt.encode(&db_user.id, &db_user.email, &roles)?;
    let user = db_user.into_user(roles);

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<User>> {
    let db_user = users::fetch_user(&state.pool, auth.user_id()).await?;
    let roles = users::fetch_roles(&state.pool, &db_user.id).await?;
    Ok(Json(db_user.into_user(roles)))
}

#[utoipa::path(
    put,
    path = "/auth/profile",
    tag = "Auth",
    security(("bearer_auth" = [])),
    request_body = ProfileUpdateRequest,
    responses((status = 200, description = "Profile updated", body = User))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ProfileUpdateRequest>,
) -> AppResult<Json<User>> {
    let current = users::fetch_user(&state.pool, auth.user_id()).await?;
    let roles = users::fetch_roles(&state.pool, &current.id).await?;

    let first_name = match payload.first_name.as_deref() {
        Some(name) => required_text(name, "first_name")?,
        None => current.first_name.clone(),
    };
    let last_name = match payload.last_name.as_deref() {
        Some(name) => required_text(name, "last_name")?,
        None => current.last_name.clone(),
    };

    sqlx::query("UPDATE users SET first_name = ?, last_name = ?, updated_at = ? WHERE id = ?")
        .bind(&first_name)
        .bind(&last_name)
        .bind(utc_now())
        .bind(&current.id)
        .execute(&state.pool)
        .await?;

    let updated = users::fetch_user(&state.pool, &current.id).await?.into_user(roles.clone());
    let before = current.into_user(roles);
    events::record(&state.event_bus, AuditAction::Updated, &auth.audit_context(), &updated, Some(&before));

    Ok(Json(updated))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Logout acknowledged", body = MessageResponse))
)]
pub async fn logout(_auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    // Tokens are stateless; the client discards its copy.
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}
