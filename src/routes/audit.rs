use axum::extract::{Query, State};
use axum::Json;

use crate::app::AppState;
use crate::authz::{self, Role};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::audit::{ActivityLogEntry, AuditPage, AuditQuery, DbActivityLog};

#[utoipa::path(
    get,
    path = "/audit",
    tag = "Audit",
    security(("bearer_auth" = [])),
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit trail, newest first", body = AuditPage),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_audit(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<AuditPage>> {
    authz::require_any_role(&auth.principal, &[Role::Admin])?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM activity_log")
        .fetch_one(&state.pool)
        .await?;

    let rows = sqlx::query_as::<_, DbActivityLog>(
        "SELECT l.id, l.entity_name, l.entity_id, l.action, l.user_id, \
         (u.first_name || ' ' || u.last_name) AS user_name, l.occurred_at, l.old_values, l.new_values, \
         l.severity, l.correlation_id, l.hash \
         FROM activity_log l LEFT JOIN users u ON u.id = l.user_id \
         ORDER BY l.id DESC LIMIT ? OFFSET ?",
    )
    .bind(query.page_size())
    .bind(query.offset())
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(AuditPage {
        items: rows.into_iter().map(ActivityLogEntry::from).collect(),
        page: query.page(),
        page_size: query.page_size(),
        total,
    }))
}
