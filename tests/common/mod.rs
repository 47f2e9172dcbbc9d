#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;

use project_manager::authz::Role;
use project_manager::create_app;
use project_manager::db::seed::{self, BootstrapConfig};
use project_manager::db::users::{self, NewUser};
use project_manager::jwt::JwtConfig;

pub const JWT_SECRET: &str = "test-secret";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub struct Account {
    pub id: String,
    pub token: String,
}

pub async fn setup() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let config = BootstrapConfig {
        admin_email: seed::DEFAULT_ADMIN_EMAIL.to_string(),
        admin_password: None,
    };
    seed::bootstrap(&pool, &config).await?;

    std::env::set_var("JWT_SECRET", JWT_SECRET);
    let app = create_app(pool.clone()).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    /// Inserts a user directly and mints a token carrying `role`.
    pub async fn account(&self, email: &str, role: Role) -> Result<Account> {
        let new_user = NewUser {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            first_name: Some(email.split('@').next().unwrap_or("user").to_string()),
            last_name: Some("Tester".to_string()),
        };
        let user = users::create_user(&self.pool, &new_user, role).await?;
        let token = JwtConfig::new(JWT_SECRET, 1).encode(&user.id, &user.email, &[role])?;
        Ok(Account { id: user.id, token })
    }

    pub async fn send(&self, method: &str, uri: &str, token: Option<&String>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(request).await?;
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, json))
    }

    pub async fn create_project(&self, token: &String, name: &str) -> Result<i64> {
        let (status, body) = self
            .send("POST", "/projects", Some(token), Some(serde_json::json!({ "name": name })))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "project create failed: {body}");
        body["id"].as_i64().context("project id missing")
    }

    pub async fn add_member(&self, token: &String, project_id: i64, user_id: &str) -> Result<()> {
        let (status, body) = self
            .send(
                "POST",
                &format!("/projects/{project_id}/members"),
                Some(token),
                Some(serde_json::json!({ "user_id": user_id })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "add member failed: {body}");
        Ok(())
    }

    pub async fn create_task(&self, token: &String, project_id: i64, body: Value) -> Result<i64> {
        let (status, resp) = self
            .send("POST", &format!("/projects/{project_id}/tasks"), Some(token), Some(body))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "task create failed: {resp}");
        resp["id"].as_i64().context("task id missing")
    }
}
