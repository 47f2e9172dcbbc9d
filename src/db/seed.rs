//! Idempotent startup bootstrap: the role catalogue and the first admin.

use sqlx::SqlitePool;

use crate::authz::Role;
use crate::db::users::{self, NewUser};
use crate::errors::AppResult;

/// Every role the service knows about, seeded into `roles`.
pub const ROLE_TABLE: &[Role] = &Role::ALL;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@project.com";

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub admin_email: String,
    /// Without a password no admin account is created.
    pub admin_password: Option<String>,
}

impl BootstrapConfig {
    pub fn from_env() -> Self {
        let admin_email = std::env::var("ADMIN_EMAIL")
            .ok()
            .filter(|email| !email.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string());
        let admin_password = std::env::var("ADMIN_PASSWORD").ok().filter(|p| !p.is_empty());

        Self {
            admin_email,
            admin_password,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub roles_created: usize,
    pub admin_created: bool,
    pub admin_role_granted: bool,
}

pub async fn bootstrap(pool: &SqlitePool, config: &BootstrapConfig) -> AppResult<BootstrapReport> {
    let mut report = BootstrapReport::default();

    for role in ROLE_TABLE {
        let inserted = sqlx::query("INSERT OR IGNORE INTO roles (name) VALUES (?)")
            .bind(role.as_str())
            .execute(pool)
            .await?
            .rows_affected();
        report.roles_created += inserted as usize;
    }

    match users::find_user_by_email(pool, &config.admin_email.to_lowercase()).await? {
        Some(existing) => {
            if !users::fetch_roles(pool, &existing.id).await?.contains(&Role::Admin) {
                users::grant_role(pool, &existing.id, Role::Admin).await?;
                report.admin_role_granted = true;
            }
        }
        None => match &config.admin_password {
            Some(password) => {
                let admin = NewUser {
                    email: config.admin_email.clone(),
                    password: password.clone(),
                    first_name: Some("Admin".to_string()),
                    last_name: Some("User".to_string()),
                };
                users::create_user(pool, &admin, Role::Admin).await?;
                report.admin_created = true;
            }
            None => {
                tracing::warn!(email = %config.admin_email, "ADMIN_PASSWORD not set, skipping admin account");
            }
        },
    }

    tracing::info!(
        roles_created = report.roles_created,
        admin_created = report.admin_created,
        admin_role_granted = report.admin_role_granted,
        "bootstrap complete"
    );
    Ok(report)
}
