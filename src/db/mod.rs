pub mod models;
mod seeders;

pub use models::*;
pub use seeders::{seed_site_profile, SITE_PROFILE_ID};

use std::path::Path;

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

pub type DbPool = SqlitePool;

/// Split a migration file into executable statements. Comment lines are
/// dropped first so a `;` inside a comment never ends a statement.
fn split_statements(sql: &str) -> Vec<String> {
    let stripped: Vec<&str> = sql
        .lines()
        .filter(|line| !line.trim().starts_with("--"))
        .collect();
    stripped
        .join("\n")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Run a migration file statement by statement; sqlx executes one
/// statement per query.
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in split_statements(sql) {
        sqlx::query(&statement).execute(pool).await?;
    }
    Ok(())
}

async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let found: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let sql = format!("SELECT name FROM pragma_table_info('{}') WHERE name = ?", table);
    let found: Option<String> = sqlx::query_scalar(&sql)
        .bind(column)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Open (creating if needed) the SQLite database under `data_dir` and bring
/// the schema up to date.
pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("drivedesk.db");
    info!("Initializing database at {}", db_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite:{}?mode=rwc", db_path.display()))
        .await?;

    // WAL so the public form endpoints never block on a dashboard write
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous = NORMAL").execute(&pool).await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Migrations are idempotent: each one is guarded by a schema probe, and
/// 001 uses IF NOT EXISTS throughout.
async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations");

    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    if !table_exists(pool, "users").await? {
        execute_sql(pool, include_str!("../../migrations/002_users.sql")).await?;
    }

    if !table_exists(pool, "instructors").await? {
        execute_sql(pool, include_str!("../../migrations/003_scheduling.sql")).await?;
    }

    if !table_exists(pool, "audit_logs").await? {
        execute_sql(pool, include_str!("../../migrations/004_audit_logs.sql")).await?;
    }

    if !column_exists(pool, "leads", "is_read").await? {
        execute_sql(pool, include_str!("../../migrations/005_lead_read_flag.sql")).await?;
    }

    // Runs on every startup, never overwrites existing content
    seeders::seed_site_profile(pool).await?;

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_statements_basic() {
        let statements = split_statements(
            "CREATE TABLE a (id TEXT);\nCREATE INDEX idx_a ON a(id);",
        );
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE"));
        assert!(statements[1].starts_with("CREATE INDEX"));
    }

    #[test]
    fn test_split_statements_semicolon_inside_comment() {
        // A ';' in a comment must not end a statement
        let statements = split_statements(
            "-- roles live in user_roles; sessions cache the effective role\n\
             CREATE TABLE users (id TEXT PRIMARY KEY);",
        );
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("CREATE TABLE users"));
    }

    #[test]
    fn test_split_statements_drops_comments_and_blanks() {
        let statements = split_statements("-- header only\n\n;\n  ;");
        assert!(statements.is_empty());
    }

    #[test]
    fn test_migration_files_split_cleanly() {
        for sql in [
            include_str!("../../migrations/001_initial.sql"),
            include_str!("../../migrations/002_users.sql"),
            include_str!("../../migrations/003_scheduling.sql"),
            include_str!("../../migrations/004_audit_logs.sql"),
            include_str!("../../migrations/005_lead_read_flag.sql"),
        ] {
            for statement in split_statements(sql) {
                assert!(
                    statement.starts_with("CREATE") || statement.starts_with("ALTER"),
                    "unexpected statement: {}",
                    statement
                );
            }
        }
    }

    #[tokio::test]
    async fn test_init_boots_on_fresh_data_dir() {
        let data_dir =
            std::env::temp_dir().join(format!("drivedesk-db-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&data_dir).unwrap();

        let pool = init(&data_dir).await.unwrap();

        for table in ["leads", "users", "sessions", "lessons", "audit_logs"] {
            assert!(table_exists(&pool, table).await.unwrap(), "missing {}", table);
        }
        assert!(column_exists(&pool, "leads", "is_read").await.unwrap());

        // Idempotent: a second pass over an initialized database is a no-op
        run_migrations(&pool).await.unwrap();

        pool.close().await;
        let _ = std::fs::remove_dir_all(&data_dir);
    }
}
