use sqlx::Row;
use std::collections::HashSet;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::SqlitePool;

use project_manager::authz::Role;
use project_manager::db::{self, seed, users};

#[derive(Parser, Debug)]
#[command(author, version, about = "project-manager admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Seed the role table and the bootstrap admin (ADMIN_EMAIL / ADMIN_PASSWORD)
    Seed,
    /// Create a user with a single role
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Admin, Manager or Member
        #[arg(long)]
        role: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Recompute the activity log hash chain
    AuditVerify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();
    let pool = get_pool().await?;

    match cli.command {
        Commands::MigrateRun => {
            db::migrate(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            print_status(&pool).await?;
        }
        Commands::Seed => {
            db::migrate(&pool).await?;
            let report = seed::bootstrap(&pool, &seed::BootstrapConfig::from_env()).await?;
            println!(
                "roles created: {}, admin created: {}, admin role granted: {}",
                report.roles_created, report.admin_created, report.admin_role_granted
            );
        }
        Commands::CreateUser {
            email,
            password,
            role,
            first_name,
            last_name,
        } => {
            let role: Role = role.parse()?;
            db::migrate(&pool).await?;
            seed::bootstrap(&pool, &seed::BootstrapConfig::from_env()).await?;

            let new_user = users::NewUser {
                email,
                password,
                first_name,
                last_name,
            };
            let created = users::create_user(&pool, &new_user, role).await?;
            println!("Created {} ({}) as {}", created.email, created.id, role);
        }
        Commands::AuditVerify => match project_manager::events::verify_chain(&pool).await? {
            None => println!("activity log chain intact"),
            Some(id) => anyhow::bail!("activity log chain broken at entry {}", id),
        },
    }

    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    db::connect(&database_url).await
}

async fn print_status(pool: &SqlitePool) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let tracked: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if tracked.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in db::MIGRATOR.iter() {
        let version = migration.version;
        let status = if applied_versions.contains(&version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, version, name);
    }

    Ok(())
}
