use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::authz::{self, Role};
use crate::errors::{conflict_on_unique, AppResult};
use crate::events::{self, AuditAction};
use crate::jwt::AuthUser;
use crate::models::tag::{Tag, TagCreateRequest};
use crate::utils::required_text;

#[utoipa::path(
    get,
    path = "/tags",
    tag = "Tags",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All tags by name", body = [Tag]))
)]
pub async fn list_tags(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<Tag>>> {
    let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name")
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(tags))
}

#[utoipa::path(
    post,
    path = "/tags",
    tag = "Tags",
    security(("bearer_auth" = [])),
    request_body = TagCreateRequest,
    responses(
        (status = 201, description = "Tag created", body = Tag),
        (status = 403, description = "Only Admins and Managers create tags"),
        (status = 409, description = "A tag with this name exists")
    )
)]
pub async fn create_tag(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<TagCreateRequest>,
) -> AppResult<(StatusCode, Json<Tag>)> {
    authz::require_any_role(&auth.principal, &[Role::Admin, Role::Manager])?;
    let name = required_text(&payload.name, "name")?;

    let tag = sqlx::query_as::<_, Tag>("INSERT INTO tags (name) VALUES (?) RETURNING id, name")
        .bind(&name)
        .fetch_one(&state.pool)
        .await
        .map_err(|err| conflict_on_unique(err, "tag already exists"))?;

    events::record(&state.event_bus, AuditAction::Created, &auth.audit_context(), &tag, None);
    Ok((StatusCode::CREATED, Json(tag)))
}
