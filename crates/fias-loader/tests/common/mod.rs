//! Shared fixtures for integration tests
//!
//! In-memory stand-ins for the database, the version service and the
//! archive fetcher, plus helpers that write FIAS-shaped XML and archives.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fias_loader::config::IngestConfig;
use fias_loader::database::Database;
use fias_loader::download::ArchiveFetcher;
use fias_loader::loader::TableStore;
use fias_loader::schema::{IngestRow, RecordSchema};
use fias_loader::version::{RemoteVersion, VersionService};
use fias_loader::{IngestError, Result};

// ============================================================================
// Table store
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Truncate(String),
    CreateShadow { table: String, shadow: String },
    Insert { target: String, rows: usize },
    Swap { table: String, shadow: String },
    Drop(String),
}

#[derive(Debug, Default)]
pub struct MemoryState {
    pub tables: HashMap<String, Vec<IngestRow>>,
    pub ops: Vec<Op>,
    /// Row count of the watched table after every operation, as a reader
    /// querying it between operations would see it
    pub samples: Vec<Option<usize>>,
    pub watch: Option<String>,
    /// Fail every insert once this many have succeeded
    pub fail_inserts_after: Option<usize>,
    /// Stores handed out and then closed
    pub closes: usize,
    inserts: usize,
}

impl MemoryState {
    fn record(&mut self, op: Op) {
        self.ops.push(op);
        if let Some(table) = &self.watch {
            let seen = self.tables.get(table).map(Vec::len);
            self.samples.push(seen);
        }
    }

    fn require(&self, table: &str) -> Result<()> {
        if self.tables.contains_key(table) {
            Ok(())
        } else {
            Err(missing(table))
        }
    }
}

fn missing(table: &str) -> IngestError {
    IngestError::Storage(sqlx::Error::Protocol(format!(
        "relation \"{table}\" does not exist"
    )))
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Store holding `table` with `rows` pre-existing rows
    pub fn with_table(table: &str, rows: Vec<IngestRow>) -> Self {
        let store = Self::default();
        store.create_table(table, rows);
        store
    }

    pub fn create_table(&self, table: &str, rows: Vec<IngestRow>) {
        self.state
            .lock()
            .unwrap()
            .tables
            .insert(table.to_string(), rows);
    }

    pub fn watch(&self, table: &str) {
        self.state.lock().unwrap().watch = Some(table.to_string());
    }

    pub fn fail_inserts_after(&self, inserts: usize) {
        self.state.lock().unwrap().fail_inserts_after = Some(inserts);
    }

    pub fn rows(&self, table: &str) -> Option<Vec<IngestRow>> {
        self.state.lock().unwrap().tables.get(table).cloned()
    }

    pub fn count(&self, table: &str) -> Option<usize> {
        self.state.lock().unwrap().tables.get(table).map(Vec::len)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state.lock().unwrap().tables.contains_key(table)
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn insert_sizes(&self) -> Vec<usize> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Insert { rows, .. } => Some(rows),
                _ => None,
            })
            .collect()
    }

    pub fn samples(&self) -> Vec<Option<usize>> {
        self.state.lock().unwrap().samples.clone()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn truncate(&mut self, table: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.require(table)?;
        state.tables.insert(table.to_string(), Vec::new());
        state.record(Op::Truncate(table.to_string()));
        Ok(())
    }

    async fn create_shadow(&mut self, table: &str, shadow: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.require(table)?;
        state.tables.insert(shadow.to_string(), Vec::new());
        state.record(Op::CreateShadow {
            table: table.to_string(),
            shadow: shadow.to_string(),
        });
        Ok(())
    }

    async fn insert_batch(
        &mut self,
        target: &str,
        schema: &RecordSchema,
        rows: &[IngestRow],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(limit) = state.fail_inserts_after {
            if state.inserts >= limit {
                return Err(IngestError::Storage(sqlx::Error::Protocol(
                    "injected insert failure".to_string(),
                )));
            }
        }
        assert!(
            rows.iter().all(|row| row.len() == schema.columns.len()),
            "every row carries every column"
        );

        let table = state.tables.get_mut(target).ok_or_else(|| missing(target))?;
        table.extend_from_slice(rows);
        state.inserts += 1;
        state.record(Op::Insert {
            target: target.to_string(),
            rows: rows.len(),
        });
        Ok(())
    }

    async fn swap_in(&mut self, table: &str, shadow: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.require(table)?;
        let rows = state.tables.remove(shadow).ok_or_else(|| missing(shadow))?;
        state.tables.insert(table.to_string(), rows);
        state.record(Op::Swap {
            table: table.to_string(),
            shadow: shadow.to_string(),
        });
        Ok(())
    }

    async fn drop_table(&mut self, table: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.tables.remove(table);
        state.record(Op::Drop(table.to_string()));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

// ============================================================================
// Database
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryDatabase {
    pub store: MemoryStore,
    pub marker: Mutex<Option<String>>,
    pub marker_writes: AtomicUsize,
    pub opened: AtomicUsize,
}

impl MemoryDatabase {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn marker(&self) -> Option<String> {
        self.marker.lock().unwrap().clone()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn read_marker(&self) -> Result<Option<String>> {
        Ok(self.marker())
    }

    async fn write_marker(&self, version: &str) -> Result<()> {
        *self.marker.lock().unwrap() = Some(version.to_string());
        self.marker_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn open_tables(&self) -> Result<Box<dyn TableStore>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.store.clone()))
    }
}

// ============================================================================
// Remote collaborators
// ============================================================================

pub struct FixedVersion {
    pub version: Mutex<Option<RemoteVersion>>,
    pub calls: AtomicUsize,
}

impl FixedVersion {
    pub fn new(version_id: i64) -> Self {
        Self {
            version: Mutex::new(Some(remote_version(version_id))),
            calls: AtomicUsize::new(0),
        }
    }

    /// A service whose every call fails
    pub fn unavailable() -> Self {
        Self {
            version: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn publish(&self, version_id: i64) {
        *self.version.lock().unwrap() = Some(remote_version(version_id));
    }
}

#[async_trait]
impl VersionService for FixedVersion {
    async fn latest(&self) -> Result<RemoteVersion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.version
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| IngestError::Transport("service unavailable".to_string()))
    }
}

pub fn remote_version(version_id: i64) -> RemoteVersion {
    RemoteVersion {
        version_id,
        text_version: format!("БД ФИАС от {version_id}"),
        complete_xml_url: format!("https://fias.example/{version_id}/fias_xml.zip"),
        delta_xml_url: None,
    }
}

/// Serves a prebuilt archive by copying it into the destination directory
pub struct LocalFetcher {
    pub archive: PathBuf,
    pub calls: AtomicUsize,
}

impl LocalFetcher {
    pub fn new(archive: PathBuf) -> Self {
        Self {
            archive,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ArchiveFetcher for LocalFetcher {
    async fn fetch(&self, _url: &str, dest_dir: &Path) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let target = dest_dir.join(self.archive.file_name().unwrap());
        tokio::fs::copy(&self.archive, &target).await?;
        Ok(target)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// `<ActualStatuses>` document with `count` statuses
pub fn actual_status_xml(count: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<ActualStatuses>\n");
    for id in 0..count {
        xml.push_str(&format!("  <ActualStatus ACTSTATID=\"{id}\" NAME=\"status {id}\" />\n"));
    }
    xml.push_str("</ActualStatuses>\n");
    xml
}

/// `<Rooms>` document with `count` rooms
pub fn room_xml(count: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<Rooms>\n");
    for id in 0..count {
        xml.push_str(&format!(
            "  <Room ROOMGUID=\"00000000-0000-0000-0000-{id:012}\" FLATNUMBER=\"{id}\" \
             FLATTYPE=\"2\" REGIONCODE=\"77\" LIVESTATUS=\"1\" OPERSTATUS=\"10\" />\n"
        ));
    }
    xml.push_str("</Rooms>\n");
    xml
}

pub fn write_zip(path: &Path, members: &[(&str, String)]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for (name, body) in members {
        zip.start_file(*name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Config rooted at `base_dir` with progress bars hidden
pub fn test_config(base_dir: &Path) -> IngestConfig {
    let mut config = IngestConfig::default();
    config.base_dir = base_dir.to_path_buf();
    config.load.show_progress = false;
    config
}
