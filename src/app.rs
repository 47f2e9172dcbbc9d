use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Method, Request};
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::docs;
use crate::errors::AppError;
use crate::events::{self, EventBus};
use crate::jwt::{JwtConfig, CORRELATION_HEADER};
use crate::routes::{admin, audit, auth, comments, health, projects, tags, tasks};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, rx) = events::init_event_bus();
    tokio::spawn(events::start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);
    let port = std::env::var("APP_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8000);
    let openapi = docs::build_openapi(port)?;

    let correlation_header = HeaderName::from_static(CORRELATION_HEADER);

    // Layers wrap outward: the correlation id is set before tracing and
    // extraction see the request, and echoed on the way back out.
    Ok(build_router(state)
        .merge(docs::swagger_routes(openapi))
        .layer(cors_from_env()?)
        .layer(PropagateRequestIdLayer::new(correlation_header.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::new(correlation_header, MakeRequestUuid)))
}

fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/logout", post(auth::logout));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route(
            "/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/:id/members", post(projects::add_member))
        .route("/:id/members/:user_id", axum::routing::delete(projects::remove_member))
        .route("/:id/tasks", post(tasks::create_task));

    let task_routes = Router::new()
        .route("/", get(tasks::list_tasks))
        .route("/:id", get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task))
        .route("/:id/assign", post(tasks::assign_task))
        .route("/:id/status", put(tasks::update_status))
        .route("/:id/tags", post(tasks::add_tags))
        .route("/:id/comments", get(comments::list_comments).post(comments::create_comment))
        .route(
            "/:id/comments/:comment_id",
            get(comments::get_comment)
                .put(comments::update_comment)
                .delete(comments::delete_comment),
        );

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/users/:id", axum::routing::delete(admin::delete_user))
        .route("/users/:id/role", put(admin::change_role));

    Router::new()
        .nest("/auth", auth_routes)
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes)
        .nest("/admin", admin_routes)
        .route("/tags", get(tags::list_tags).post(tags::create_tag))
        .route("/audit", get(audit::list_audit))
        .route("/api/health", get(health::health))
        .with_state(state)
}

/// `CORS_ORIGINS` is a comma-separated origin list; unset or `*` allows any.
fn cors_from_env() -> Result<CorsLayer, AppError> {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(CORRELATION_HEADER)]);

    let origins = std::env::var("CORS_ORIGINS").unwrap_or_default();
    let origins = origins.trim();
    if origins.is_empty() || origins == "*" {
        return Ok(base.allow_origin(Any));
    }

    let parsed = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|_| AppError::configuration(format!("invalid CORS origin: {origin}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(base.allow_origin(AllowOrigin::list(parsed)))
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        correlation_id = %correlation_id,
    )
}
