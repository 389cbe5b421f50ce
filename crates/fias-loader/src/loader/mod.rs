//! Batch loading with large-table protection
//!
//! [`BatchLoader::load`] drains a row stream into a [`TableStore`] in batches
//! of [`BATCH_CAPACITY`]. The write target depends on the source file size:
//!
//! - at or below the shadow threshold the target table is truncated and
//!   filled in place; a failure leaves it truncated
//! - above the threshold a shadow copy `temp_<table>` is created and filled,
//!   then swapped in with one transaction; a failure drops the shadow and
//!   leaves the target untouched
//!
//! Readers of a shadowed table see the old contents until the swap commits.

pub mod postgres;

pub use postgres::PgTableStore;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extractor::ExtractError;
use crate::schema::{IngestRow, RecordSchema};

/// Rows per bulk insert
pub const BATCH_CAPACITY: usize = 5000;

/// Files larger than this many bytes load through a shadow table
pub const DEFAULT_SHADOW_THRESHOLD: u64 = 20_388_921;

const SHADOW_PREFIX: &str = "temp_";

pub fn shadow_name(table: &str) -> String {
    format!("{SHADOW_PREFIX}{table}")
}

/// Fixed-capacity row buffer
#[derive(Debug)]
pub struct Batch {
    rows: Vec<IngestRow>,
    capacity: usize,
}

impl Batch {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a row; returns true once the batch is full
    pub fn push(&mut self, row: IngestRow) -> bool {
        self.rows.push(row);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Hand out the buffered rows and start over
    pub fn take(&mut self) -> Vec<IngestRow> {
        std::mem::replace(&mut self.rows, Vec::with_capacity(self.capacity))
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new(BATCH_CAPACITY)
    }
}

/// How a table is rewritten
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStrategy {
    Truncate,
    Shadow { shadow: String },
}

impl LoadStrategy {
    pub fn for_file(table: &str, size: u64, threshold: u64) -> Self {
        if size > threshold {
            LoadStrategy::Shadow {
                shadow: shadow_name(table),
            }
        } else {
            LoadStrategy::Truncate
        }
    }
}

/// Table-level operations the loader needs from a database.
///
/// One store serves one file load and is closed after it. Implementations
/// must make [`swap_in`](TableStore::swap_in) atomic for concurrent readers.
#[async_trait]
pub trait TableStore: Send {
    /// Remove every row from `table`
    async fn truncate(&mut self, table: &str) -> Result<()>;

    /// Drop any stale `shadow`, then create it with the structure of `table`
    async fn create_shadow(&mut self, table: &str, shadow: &str) -> Result<()>;

    /// Bulk insert `rows`, all shaped by `schema`, into `target`
    async fn insert_batch(
        &mut self,
        target: &str,
        schema: &RecordSchema,
        rows: &[IngestRow],
    ) -> Result<()>;

    /// Replace `table` with `shadow` in one transaction
    async fn swap_in(&mut self, table: &str, shadow: &str) -> Result<()>;

    /// Drop `table` if it exists
    async fn drop_table(&mut self, table: &str) -> Result<()>;

    /// Release the underlying connection; the store is unusable afterwards
    async fn close(&mut self) -> Result<()>;
}

/// Outcome of one table load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub strategy: LoadStrategy,
    pub rows: u64,
    pub inserts: usize,
}

/// Drives one row stream into one table
#[derive(Debug, Clone)]
pub struct BatchLoader {
    shadow_threshold: u64,
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self::new(DEFAULT_SHADOW_THRESHOLD)
    }
}

impl BatchLoader {
    pub fn new(shadow_threshold: u64) -> Self {
        Self { shadow_threshold }
    }

    pub fn shadow_threshold(&self) -> u64 {
        self.shadow_threshold
    }

    /// Load `rows`, decoded from a file of `size` bytes, into `schema.table`
    pub async fn load<S, I>(
        &self,
        store: &mut S,
        schema: &RecordSchema,
        size: u64,
        rows: I,
    ) -> Result<LoadReport>
    where
        S: TableStore + ?Sized,
        I: Iterator<Item = std::result::Result<IngestRow, ExtractError>> + Send,
    {
        let table = schema.table;
        let strategy = LoadStrategy::for_file(table, size, self.shadow_threshold);

        let outcome = match &strategy {
            LoadStrategy::Truncate => {
                debug!(table, size, "truncating table in place");
                Self::write(store, schema, table, rows, None).await
            }
            LoadStrategy::Shadow { shadow } => {
                debug!(table, shadow = %shadow, size, "loading through shadow table");
                Self::write(store, schema, shadow, rows, Some(table)).await
            }
        };

        let (row_count, inserts) = match outcome {
            Ok(counts) => counts,
            Err(e) => {
                if let LoadStrategy::Shadow { shadow } = &strategy {
                    if let Err(cleanup) = store.drop_table(shadow).await {
                        warn!(shadow = %shadow, error = %cleanup, "failed to drop shadow table");
                    }
                }
                return Err(e);
            }
        };

        info!(table, rows = row_count, inserts, strategy = ?strategy, "table loaded");

        Ok(LoadReport {
            table: table.to_string(),
            strategy,
            rows: row_count,
            inserts,
        })
    }

    /// Prepare `target`, fill it and, when `swap_into` is set, swap it in
    async fn write<S, I>(
        store: &mut S,
        schema: &RecordSchema,
        target: &str,
        rows: I,
        swap_into: Option<&str>,
    ) -> Result<(u64, usize)>
    where
        S: TableStore + ?Sized,
        I: Iterator<Item = std::result::Result<IngestRow, ExtractError>> + Send,
    {
        match swap_into {
            Some(table) => store.create_shadow(table, target).await?,
            None => store.truncate(target).await?,
        }

        let mut batch = Batch::new(BATCH_CAPACITY);
        let mut row_count = 0_u64;
        let mut inserts = 0_usize;

        for row in rows {
            row_count += 1;
            if batch.push(row?) {
                store.insert_batch(target, schema, &batch.take()).await?;
                inserts += 1;
            }
        }

        if !batch.is_empty() {
            store.insert_batch(target, schema, &batch.take()).await?;
            inserts += 1;
        }

        if let Some(table) = swap_into {
            store.swap_in(table, target).await?;
        }

        Ok((row_count, inserts))
    }
}
