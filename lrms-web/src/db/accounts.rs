//! Credential store
//!
//! Pending registrations and active accounts share the `accounts` table, so
//! a username is unique across both. Argon2 work runs on the blocking pool.

use chrono::Utc;
use lrms_common::config::ROOT_ADMIN_USERNAME;
use lrms_common::credentials::{hash_password, verify_password};
use lrms_common::db::{Account, AccountStatus, AccountSummary, Role};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::{AccountError, LoginError};

async fn hash_blocking(password: &str) -> Result<String, AccountError> {
    let password = password.to_string();
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| lrms_common::Error::Internal(format!("Password hashing task failed: {}", e)))??;
    Ok(hash)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn account_from_row(row: &SqliteRow) -> Result<Account, AccountError> {
    let role: String = row.get("role");
    let status: String = row.get("status");

    Ok(Account {
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        role: role.parse()?,
        status: status.parse()?,
    })
}

pub async fn get_account(pool: &SqlitePool, username: &str) -> Result<Option<Account>, AccountError> {
    let row = sqlx::query("SELECT username, password_hash, role, status FROM accounts WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(account_from_row).transpose()
}

/// Request a new user account; it stays pending until an admin approves it.
pub async fn register(pool: &SqlitePool, username: &str, password: &str) -> Result<(), AccountError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AccountError::MissingCredentials);
    }

    let hash = hash_blocking(password).await?;

    let result = sqlx::query("INSERT INTO accounts (username, password_hash, role, status) VALUES (?, ?, ?, ?)")
        .bind(username)
        .bind(&hash)
        .bind(Role::User.as_str())
        .bind(AccountStatus::Pending.as_str())
        .execute(pool)
        .await;

    match result {
        Ok(_) => {
            info!(username = %username, "Account requested");
            Ok(())
        }
        Err(e) if is_unique_violation(&e) => Err(AccountError::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

/// Check credentials of an active account.
///
/// Unknown and pending usernames are indistinguishable to the caller.
pub async fn authenticate(pool: &SqlitePool, username: &str, password: &str) -> Result<Account, LoginError> {
    let account = match get_account(pool, username).await? {
        Some(account) if account.status == AccountStatus::Active => account,
        _ => return Err(LoginError::UnknownAccount),
    };

    let password = password.to_string();
    let stored = account.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| {
            AccountError::Store(lrms_common::Error::Internal(format!(
                "Password verification task failed: {}",
                e
            )))
        })?;

    if verified {
        Ok(account)
    } else {
        Err(LoginError::InvalidCredentials)
    }
}

/// Activate a pending account
pub async fn approve(pool: &SqlitePool, username: &str) -> Result<(), AccountError> {
    let result = sqlx::query(
        "UPDATE accounts SET status = 'active', approved_at = ? WHERE username = ? AND status = 'pending'",
    )
    .bind(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
    .bind(username)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AccountError::NotPending(username.to_string()));
    }

    info!(username = %username, "Account approved");
    Ok(())
}

/// Remove an active account. The root admin can never be removed.
pub async fn delete(pool: &SqlitePool, username: &str) -> Result<(), AccountError> {
    if username == ROOT_ADMIN_USERNAME {
        return Err(AccountError::Protected);
    }

    let result = sqlx::query("DELETE FROM accounts WHERE username = ? AND status = 'active'")
        .bind(username)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AccountError::NotFound(username.to_string()));
    }

    info!(username = %username, "Account deleted");
    Ok(())
}

/// Active accounts first, then pending ones; each group by username
pub async fn list(pool: &SqlitePool) -> Result<Vec<AccountSummary>, AccountError> {
    let rows = sqlx::query(
        r#"
        SELECT username, role, status, created_at, approved_at
        FROM accounts
        ORDER BY CASE status WHEN 'active' THEN 0 ELSE 1 END, username
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<AccountSummary, AccountError> {
            let role: String = row.get("role");
            let status: String = row.get("status");
            Ok(AccountSummary {
                username: row.get("username"),
                role: role.parse()?,
                status: status.parse()?,
                created_at: row.get("created_at"),
                approved_at: row.get("approved_at"),
            })
        })
        .collect()
}

/// Create the root admin if it does not exist yet.
///
/// Returns true when the account was created by this call.
pub async fn seed_root_admin(pool: &SqlitePool, username: &str, password: &str) -> Result<bool, AccountError> {
    let hash = hash_blocking(password).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO accounts (username, password_hash, role, status, approved_at)
        VALUES (?, ?, 'admin', 'active', ?)
        ON CONFLICT(username) DO NOTHING
        "#,
    )
    .bind(username)
    .bind(&hash)
    .bind(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
    .execute(pool)
    .await?;

    let created = result.rows_affected() > 0;
    if created {
        info!(username = %username, "Seeded root admin account");
    }
    Ok(created)
}
