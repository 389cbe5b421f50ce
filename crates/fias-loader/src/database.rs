//! Database access for the orchestrator
//!
//! Connections are short-lived: one to read the version marker, one per file
//! load, one to write the marker. Nothing holds a connection across phases.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::loader::{PgTableStore, TableStore};

/// Key of the version marker row in `config`
pub const MARKER_KEY: &str = "TextVersion";

/// Marker storage and per-load table stores
#[async_trait]
pub trait Database: Send + Sync {
    /// Last applied dataset version, if any
    async fn read_marker(&self) -> Result<Option<String>>;

    async fn write_marker(&self, version: &str) -> Result<()>;

    /// Fresh store for one file load
    async fn open_tables(&self) -> Result<Box<dyn TableStore>>;
}

/// `Database` over PostgreSQL
#[derive(Debug, Clone)]
pub struct PgDatabase {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PgDatabase {
    pub fn new(options: PgConnectOptions, connect_timeout: Duration) -> Self {
        Self {
            options,
            connect_timeout,
        }
    }

    async fn connect(&self) -> Result<PgConnection> {
        tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
            .map_err(|_| {
                IngestError::Storage(sqlx::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "timed out connecting to the database",
                )))
            })?
            .map_err(IngestError::from)
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn read_marker(&self) -> Result<Option<String>> {
        let mut conn = self.connect().await?;
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM config WHERE id = $1")
                .bind(MARKER_KEY)
                .fetch_optional(&mut conn)
                .await?;
        conn.close().await?;

        let value = value.flatten();

        debug!(marker = ?value, "version marker read");
        Ok(value)
    }

    async fn write_marker(&self, version: &str) -> Result<()> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        let updated = sqlx::query("UPDATE config SET value = $1 WHERE id = $2")
            .bind(version)
            .bind(MARKER_KEY)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if updated == 0 {
            sqlx::query("INSERT INTO config (id, value) VALUES ($1, $2)")
                .bind(MARKER_KEY)
                .bind(version)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        conn.close().await?;

        debug!(marker = version, "version marker written");
        Ok(())
    }

    async fn open_tables(&self) -> Result<Box<dyn TableStore>> {
        let conn = self.connect().await?;
        Ok(Box::new(PgTableStore::from_connection(conn)))
    }
}
