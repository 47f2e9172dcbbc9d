use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::query_scalar;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::errors::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
    pub db_error: Option<String>,
    pub version: &'static str,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Service and database liveness", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let db_check = query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await;

    let (status, db_ok, db_error) = match db_check {
        Ok(_) => ("ok", true, None),
        Err(err) => {
            tracing::warn!(error = %err, "health check database probe failed");
            ("degraded", false, Some(err.to_string()))
        }
    };

    Ok(Json(HealthResponse {
        status,
        db_ok,
        db_error,
        version: env!("CARGO_PKG_VERSION"),
    }))
}
