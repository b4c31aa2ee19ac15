//! SQLite-backed draft storage.
//!
//! Reads are served from a write-through cache. Writes update the cache and queue
//! the payload for a background task, so callers never wait on the database.

use std::sync::Mutex;

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tokio::sync::{mpsc, oneshot};

use crate::drafts::{lock, DraftStorage};
use crate::errors::StorageError;

enum WriterCommand {
    Write(String),
    Flush(oneshot::Sender<()>),
}

/// Durable storage for the draft map, kept under one named row of `kv_store`.
pub struct SqliteDraftStorage {
    cache: Mutex<Option<String>>,
    tx: mpsc::UnboundedSender<WriterCommand>,
}

impl SqliteDraftStorage {
    /// Load the current payload and start the background writer.
    pub async fn open(pool: SqlitePool, name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();
        let payload = load_payload(&pool, &name).await?;
        tracing::debug!(
            "Loaded draft entry {:?} ({} bytes)",
            name,
            payload.as_ref().map(String::len).unwrap_or(0)
        );

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(pool, name, rx));

        Ok(Self {
            cache: Mutex::new(payload),
            tx,
        })
    }

    /// Wait until every write queued so far has reached the database.
    pub async fn flush(&self) -> Result<(), StorageError> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(WriterCommand::Flush(done))
            .map_err(|_| StorageError::Closed)?;
        wait.await.map_err(|_| StorageError::Closed)
    }
}

impl DraftStorage for SqliteDraftStorage {
    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.cache).clone())
    }

    fn write(&self, payload: &str) -> Result<(), StorageError> {
        *lock(&self.cache) = Some(payload.to_string());
        self.tx
            .send(WriterCommand::Write(payload.to_string()))
            .map_err(|_| StorageError::Closed)
    }
}

/// Read the payload stored under `name`.
pub async fn load_payload(pool: &SqlitePool, name: &str) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT payload FROM kv_store WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| row.get("payload")))
}

async fn save_payload(pool: &SqlitePool, name: &str, payload: &str) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO kv_store (name, payload, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at
        "#,
    )
    .bind(name)
    .bind(payload)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(())
}

async fn run_writer(
    pool: SqlitePool,
    name: String,
    mut rx: mpsc::UnboundedReceiver<WriterCommand>,
) {
    while let Some(command) = rx.recv().await {
        // Each payload is the whole map, so only the newest queued one is written.
        let mut latest = None;
        let mut waiters = Vec::new();
        let mut next = Some(command);
        while let Some(command) = next {
            match command {
                WriterCommand::Write(payload) => latest = Some(payload),
                WriterCommand::Flush(done) => {
                    waiters.push(done);
                    break;
                }
            }
            next = rx.try_recv().ok();
        }

        if let Some(payload) = latest {
            if let Err(e) = save_payload(&pool, &name, &payload).await {
                tracing::warn!("Failed to persist drafts to {:?}: {}", name, e);
            }
        }

        for done in waiters {
            let _ = done.send(());
        }
    }
    tracing::debug!("Draft writer for {:?} stopped", name);
}
