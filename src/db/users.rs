//! User and role persistence shared by the auth, admin and bootstrap paths.

use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::{conflict_on_unique, AppError, AppResult};
use crate::models::user::DbUser;
use crate::utils::{hash_password, normalize_email, utc_now};

const USER_COLUMNS: &str = "id, email, first_name, last_name, password_hash, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Inserts a user holding exactly `role`.
pub async fn create_user(pool: &SqlitePool, new_user: &NewUser, role: Role) -> AppResult<DbUser> {
    let email = normalize_email(&new_user.email)?;
    let password_hash = hash_password(&new_user.password)?;
    let now = utc_now();
    let user_id = Uuid::new_v4().to_string();
    let name_or_default = |name: &Option<String>| {
        name.as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("N/A")
            .to_string()
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO users (id, email, first_name, last_name, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user_id)
    .bind(&email)
    .bind(name_or_default(&new_user.first_name))
    .bind(name_or_default(&new_user.last_name))
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| conflict_on_unique(err, "email already in use"))?;

    link_role(&mut tx, &user_id, role).await?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, role = %role, "user created");
    fetch_user(pool, &user_id).await
}

pub async fn fetch_user(pool: &SqlitePool, user_id: &str) -> AppResult<DbUser> {
    find_user(pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn find_user(pool: &SqlitePool, user_id: &str) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    Ok(sqlx::query_as::<_, DbUser>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    Ok(sqlx::query_as::<_, DbUser>(&sql)
        .bind(email.trim())
        .fetch_optional(pool)
        .await?)
}

pub async fn list_users(pool: &SqlitePool) -> AppResult<Vec<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY email");
    Ok(sqlx::query_as::<_, DbUser>(&sql).fetch_all(pool).await?)
}

/// Roles held by the user, highest privilege first. Names the role enum
/// does not know are skipped.
pub async fn fetch_roles(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<Role>> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT r.name FROM roles r JOIN user_roles ur ON ur.role_id = r.id WHERE ur.user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut roles: Vec<Role> = names.iter().filter_map(|name| name.parse().ok()).collect();
    roles.sort();
    roles.dedup();
    Ok(roles)
}

/// Replaces the user's role set with exactly `role`.
pub async fn replace_roles(pool: &SqlitePool, user_id: &str, role: Role) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    link_role(&mut tx, user_id, role).await?;

    tx.commit().await?;
    Ok(())
}

/// Inserts the user/role link. Fails when `roles` has no row for `role`,
/// which means bootstrap has not run against this database.
async fn link_role(tx: &mut Transaction<'_, Sqlite>, user_id: &str, role: Role) -> AppResult<()> {
    let inserted = sqlx::query("INSERT INTO user_roles (user_id, role_id) SELECT ?, id FROM roles WHERE name = ?")
        .bind(user_id)
        .bind(role.as_str())
        .execute(&mut **tx)
        .await?;

    if inserted.rows_affected() != 1 {
        tracing::error!(user_id, role = %role, "role is not seeded");
        return Err(AppError::internal(format!("role {role} is not seeded")));
    }
    Ok(())
}

pub async fn grant_role(pool: &SqlitePool, user_id: &str, role: Role) -> AppResult<()> {
    sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) SELECT ?, id FROM roles WHERE name = ?")
        .bind(user_id)
        .bind(role.as_str())
        .execute(pool)
        .await?;
    Ok(())
}
