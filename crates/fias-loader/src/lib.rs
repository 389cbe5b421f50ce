//! FIAS Loader Library
//!
//! Periodic loader of the FIAS address registry into PostgreSQL.
//!
//! The registry is published as an archive of XML extracts named
//! `<tag>_<yyyymmdd>_<suffix>`. Each extract is classified by file name,
//! decoded element by element and bulk loaded into its table. Large tables
//! are rebuilt in a shadow copy and swapped in atomically so readers never
//! see them empty.
//!
//! # Modules
//!
//! - [`schema`]: record shapes and the FIAS catalogue
//! - [`classifier`]: file name to schema key rules
//! - [`extractor`]: streaming XML to rows
//! - [`loader`]: batching, bulk inserts, shadow swap
//! - [`orchestrator`]: version check, download, unpack and per-file loads
//!
//! # Example
//!
//! ```no_run
//! use fias_loader::{loader::BatchLoader, schema::{SchemaKey, SchemaRegistry}};
//! use fias_loader::extractor::RowExtractor;
//! use fias_loader::loader::{PgTableStore, TableStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = SchemaRegistry::fias();
//!     let schema = registry.get(SchemaKey::ActualStatus).expect("registered");
//!
//!     let options = "postgres://localhost/fias".parse()?;
//!     let mut store = PgTableStore::connect(&options).await?;
//!
//!     let path = "FIAS/AS_ACTSTAT_20240118_0b6a7c26.XML";
//!     let size = std::fs::metadata(path)?.len();
//!     let file = std::io::BufReader::new(std::fs::File::open(path)?);
//!     let report = BatchLoader::default()
//!         .load(&mut store, schema, size, RowExtractor::new(file, schema))
//!         .await?;
//!     store.close().await?;
//!
//!     println!("{} rows into {}", report.rows, report.table);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod classifier;
pub mod config;
pub mod database;
pub mod download;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod orchestrator;
pub mod schema;
pub mod unpack;
pub mod version;

pub use error::{ErrorKind, IngestError, Result};
