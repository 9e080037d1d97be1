//! Database initialization
//!
//! Opens (creating if needed) the SQLite database named by the configured
//! URL and creates every table idempotently. Foreign keys are enabled on
//! every pooled connection so the measurement tables cascade on profile
//! deletion.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::db::models::MeasurementTable;
use crate::Result;

/// Initialize database connection and create tables if needed
pub async fn init_database(database_url: &str) -> Result<SqlitePool> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));

    // WAL allows concurrent readers with one writer; not available in memory
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    // An in-memory database lives only as long as its single connection
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(10)
    };

    let pool = pool_options.connect_with(options).await?;
    info!("Opened database: {}", database_url);

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_learner_profiles_table(pool).await?;
    for table in MeasurementTable::ALL {
        create_measurement_table(pool, table).await?;
    }
    create_accounts_table(pool).await?;
    create_staged_uploads_table(pool).await?;

    Ok(())
}

async fn create_learner_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS learner_profiles (
            learner_number TEXT PRIMARY KEY CHECK (length(trim(learner_number)) > 0),
            name TEXT NOT NULL,
            gender TEXT,
            region TEXT,
            learning_hub TEXT,
            program TEXT,
            class TEXT,
            co_learner TEXT,
            grade_level TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_learner_profiles_region ON learner_profiles(region)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_measurement_table(pool: &SqlitePool, table: MeasurementTable) -> Result<()> {
    let name = table.table_name();

    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {name} (
            id INTEGER PRIMARY KEY,
            learner_number TEXT REFERENCES learner_profiles(learner_number) ON DELETE CASCADE,
            {columns}
        )
        "#,
        name = name,
        columns = table.measurement_columns(),
    );
    sqlx::query(&ddl).execute(pool).await?;

    let index = format!(
        "CREATE INDEX IF NOT EXISTS idx_{name}_learner ON {name}(learner_number)",
        name = name
    );
    sqlx::query(&index).execute(pool).await?;

    Ok(())
}

/// Create the accounts table
///
/// Pending registrations and active accounts share one table keyed by
/// username, so a name can never be both pending and active.
async fn create_accounts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            username TEXT PRIMARY KEY CHECK (length(username) > 0),
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('admin', 'user')),
            status TEXT NOT NULL CHECK (status IN ('pending', 'active')),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            approved_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the staged_uploads table
///
/// One row per region holding the validated workbook awaiting commit.
async fn create_staged_uploads_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staged_uploads (
            region TEXT PRIMARY KEY CHECK (region IN ('Luzon', 'Visayas', 'Mindanao')),
            file_path TEXT NOT NULL,
            original_filename TEXT,
            uploaded_by TEXT,
            uploaded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
