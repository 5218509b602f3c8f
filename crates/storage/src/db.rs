use std::path::Path;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use thiserror::Error;
use uuid::Uuid;

use ledgerlens_core::{ProcessedReceipt, ReceiptStatus};

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("stored payload corrupt: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("receipt not found: {0}")]
    NotFound(Uuid),
}

/// Open (creating if needed) the receipts database and run migrations.
pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous = NORMAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), StorageError> {
    // Indexed columns drive the queries; `payload` keeps the full record.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS receipts (
            id TEXT PRIMARY KEY,
            sha256 TEXT UNIQUE,
            vendor TEXT,
            total_cents INTEGER,
            receipt_date TEXT,
            category TEXT NOT NULL,
            status TEXT NOT NULL,
            requires_review INTEGER NOT NULL DEFAULT 0,
            confidence REAL NOT NULL DEFAULT 0,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_receipts_status ON receipts(status, requires_review)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_receipt(pool: &DbPool, p: &ProcessedReceipt) -> Result<(), StorageError> {
    let payload = serde_json::to_string(p)?;
    sqlx::query(
        r#"
        INSERT INTO receipts
            (id, sha256, vendor, total_cents, receipt_date, category, status,
             requires_review, confidence, payload, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(p.receipt.id.to_string())
    .bind(&p.receipt.sha256_hex)
    .bind(p.receipt.vendor.as_ref().map(|v| v.value.clone()))
    .bind(p.receipt.total_cents.as_ref().map(|t| t.value))
    .bind(p.receipt.date.as_ref().map(|d| d.value.to_string()))
    .bind(&p.category)
    .bind(p.status.to_string())
    .bind(p.requires_review as i64)
    .bind(p.receipt.confidence as f64)
    .bind(payload)
    .bind(p.receipt.created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Look up a previously processed upload by content hash.
pub async fn find_by_hash(
    pool: &DbPool,
    sha256_hex: &str,
) -> Result<Option<ProcessedReceipt>, StorageError> {
    let row = sqlx::query_as::<_, (String,)>("SELECT payload FROM receipts WHERE sha256 = ?")
        .bind(sha256_hex)
        .fetch_optional(pool)
        .await?;
    row.map(|(payload,)| serde_json::from_str(&payload)).transpose().map_err(Into::into)
}

/// Most recently stored receipts, newest first.
pub async fn list_recent(pool: &DbPool, limit: i64) -> Result<Vec<ProcessedReceipt>, StorageError> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT payload FROM receipts ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.into_iter()
        .map(|(payload,)| serde_json::from_str(&payload).map_err(Into::into))
        .collect()
}

pub async fn list_all(pool: &DbPool) -> Result<Vec<ProcessedReceipt>, StorageError> {
    list_recent(pool, i64::MAX).await
}

pub async fn list_pending_review(pool: &DbPool) -> Result<Vec<ProcessedReceipt>, StorageError> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT payload FROM receipts WHERE requires_review = 1 AND status = 'pending_review' \
         ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter()
        .map(|(payload,)| serde_json::from_str(&payload).map_err(Into::into))
        .collect()
}

/// Set a receipt's status (approve/reject/sync) and append a note.
/// Rewrites the stored payload so both views stay consistent. The
/// read-modify-write runs in one transaction so concurrent updates to the
/// same receipt cannot drop each other's notes.
pub async fn update_status(
    pool: &DbPool,
    id: Uuid,
    status: ReceiptStatus,
    note: &str,
) -> Result<ProcessedReceipt, StorageError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, (String,)>("SELECT payload FROM receipts WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::NotFound(id))?;

    let mut p: ProcessedReceipt = serde_json::from_str(&row.0)?;
    match status {
        ReceiptStatus::Approved => p.approve(note),
        ReceiptStatus::Rejected => p.reject(note),
        ReceiptStatus::Synced => p.mark_synced(note),
        other => {
            p.status = other;
            if !note.is_empty() {
                p.notes.push_str(note);
                p.notes.push(' ');
            }
        }
    }

    sqlx::query(
        "UPDATE receipts SET status = ?, requires_review = ?, payload = ? WHERE id = ?",
    )
    .bind(p.status.to_string())
    .bind(p.requires_review as i64)
    .bind(serde_json::to_string(&p)?)
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(p)
}

pub async fn count_by_status(pool: &DbPool, status: ReceiptStatus) -> Result<i64, StorageError> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM receipts WHERE status = ?")
            .bind(status.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count)
}
