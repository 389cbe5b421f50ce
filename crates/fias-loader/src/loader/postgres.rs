//! PostgreSQL table store
//!
//! Batches are written with one `INSERT .. SELECT .. FROM UNNEST(..)`
//! statement: every column is bound as a single array parameter, so the
//! statement has as many parameters as the schema has columns no matter how
//! many rows the batch holds. Each unnested column is cast to the declared
//! type of its destination column, looked up once per target. String
//! destinations are left to the assignment cast so their length limits
//! still reject overlong values.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Postgres, QueryBuilder};
use tracing::debug;

use super::TableStore;
use crate::error::{IngestError, Result};
use crate::schema::{ColumnType, IngestRow, RecordSchema, Value};

/// One connection, used for one file load
pub struct PgTableStore {
    conn: Option<PgConnection>,
    column_types: HashMap<String, HashMap<String, String>>,
}

impl PgTableStore {
    pub async fn connect(options: &PgConnectOptions) -> Result<Self> {
        let conn = PgConnection::connect_with(options).await?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: PgConnection) -> Self {
        Self {
            conn: Some(conn),
            column_types: HashMap::new(),
        }
    }

    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.conn.as_mut().ok_or_else(|| {
            IngestError::Storage(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "table store already closed",
            )))
        })
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        debug!(sql, "executing");
        sqlx::query(sql).execute(self.conn()?).await?;
        Ok(())
    }

    /// Declared type of every column of `table`, keyed by column name
    async fn column_types(&mut self, table: &str) -> Result<&HashMap<String, String>> {
        if !self.column_types.contains_key(table) {
            let rows: Vec<(String, String)> = sqlx::query_as(
                r#"
                SELECT a.attname::text, format_type(a.atttypid, a.atttypmod)
                FROM pg_attribute a
                WHERE a.attrelid = to_regclass($1)
                  AND a.attnum > 0
                  AND NOT a.attisdropped
                "#,
            )
            .bind(quote_ident(table))
            .fetch_all(self.conn()?)
            .await?;

            self.column_types
                .insert(table.to_string(), rows.into_iter().collect());
        }

        Ok(self
            .column_types
            .entry(table.to_string())
            .or_default())
    }
}

#[async_trait]
impl TableStore for PgTableStore {
    async fn truncate(&mut self, table: &str) -> Result<()> {
        self.execute(&format!("TRUNCATE TABLE {}", quote_ident(table)))
            .await
    }

    async fn create_shadow(&mut self, table: &str, shadow: &str) -> Result<()> {
        self.drop_table(shadow).await?;
        self.execute(&format!(
            "CREATE TABLE {} (LIKE {} INCLUDING ALL)",
            quote_ident(shadow),
            quote_ident(table)
        ))
        .await
    }

    async fn insert_batch(
        &mut self,
        target: &str,
        schema: &RecordSchema,
        rows: &[IngestRow],
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let declared = self.column_types(target).await?.clone();

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO ");
        query.push(quote_ident(target)).push(" (");
        {
            let mut names = query.separated(", ");
            for column in schema.columns {
                names.push(quote_ident(column.name));
            }
        }

        query.push(") SELECT ");
        {
            let mut projections = query.separated(", ");
            for (index, column) in schema.columns.iter().enumerate() {
                projections.push(format!("u.c{index}"));
                let cast = declared
                    .get(column.name)
                    .map(String::as_str)
                    .and_then(projection_cast);
                if let Some(pg_type) = cast {
                    projections.push_unseparated(format!("::{pg_type}"));
                }
            }
        }

        query.push(" FROM UNNEST(");
        {
            let mut arrays = query.separated(", ");
            for (index, column) in schema.columns.iter().enumerate() {
                match column.kind {
                    ColumnType::Text => arrays.push_bind(text_column(rows, index)),
                    ColumnType::Integer => arrays.push_bind(integer_column(rows, index)),
                    ColumnType::Byte => arrays.push_bind(byte_column(rows, index)),
                };
                arrays.push_unseparated(format!("::{}", column.kind.pg_array_type()));
            }
        }

        query.push(") AS u(");
        {
            let mut aliases = query.separated(", ");
            for index in 0..schema.columns.len() {
                aliases.push(format!("c{index}"));
            }
        }
        query.push(")");

        query.build().execute(self.conn()?).await?;
        debug!(table = target, rows = rows.len(), "batch inserted");
        Ok(())
    }

    async fn swap_in(&mut self, table: &str, shadow: &str) -> Result<()> {
        let mut tx = self.conn()?.begin().await?;
        sqlx::query(&format!("DROP TABLE {}", quote_ident(table)))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(shadow),
            quote_ident(table)
        ))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        // The rename changed what the shadow name refers to
        self.column_types.remove(table);
        self.column_types.remove(shadow);
        Ok(())
    }

    async fn drop_table(&mut self, table: &str) -> Result<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
            .await?;
        self.column_types.remove(table);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        Ok(())
    }
}

/// Explicit cast for an unnested column bound for a `declared` column, or
/// none for string types
fn projection_cast(declared: &str) -> Option<&str> {
    if declared.ends_with("[]") {
        return Some(declared);
    }
    let base = declared.split('(').next().unwrap_or(declared).trim();
    match base {
        "text" | "character varying" | "character" | "\"char\"" | "name" => None,
        _ => Some(declared),
    }
}

fn text_column(rows: &[IngestRow], index: usize) -> Vec<String> {
    rows.iter()
        .map(|row| match row.value_at(index) {
            Some(Value::Text(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
        .collect()
}

fn integer_column(rows: &[IngestRow], index: usize) -> Vec<i64> {
    rows.iter()
        .map(|row| match row.value_at(index) {
            Some(Value::Integer(i)) => *i,
            Some(Value::Byte(b)) => i64::from(*b),
            _ => 0,
        })
        .collect()
}

fn byte_column(rows: &[IngestRow], index: usize) -> Vec<i16> {
    rows.iter()
        .map(|row| match row.value_at(index) {
            Some(Value::Byte(b)) => i16::from(*b),
            _ => 0,
        })
        .collect()
}

/// Quote a table or column name as a PostgreSQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
