//! Ingestion orchestrator
//!
//! One cycle checks the remote release against the local version marker
//! and, when they differ, downloads and unpacks the archive and reloads every
//! classified member, one file at a time. Failures before the first table
//! is touched abort the cycle; failures while loading a file are logged and
//! the cycle moves on to the next file. The marker is written only when every
//! classified file loaded, so an incomplete release is retried.

use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fias_common::progress::{byte_progress, format_bytes};
use tracing::{error, info, warn};

use crate::classifier::Classifier;
use crate::config::IngestConfig;
use crate::database::Database;
use crate::download::ArchiveFetcher;
use crate::error::{IngestError, Result};
use crate::extractor::RowExtractor;
use crate::loader::{BatchLoader, LoadReport};
use crate::schema::{SchemaKey, SchemaRegistry};
use crate::unpack::{self, FileDescriptor};
use crate::version::{RemoteVersion, VersionService};

/// Result of one cycle
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// The remote version matches the marker; nothing was touched
    Unchanged { version: String },
    /// Every classified file loaded and the marker now names `version`
    Applied {
        version: String,
        report: DirectoryReport,
    },
    /// Some files failed; the marker was left alone
    Incomplete {
        version: String,
        report: DirectoryReport,
    },
}

/// Per-file results of loading a directory
#[derive(Debug, Clone, Default)]
pub struct DirectoryReport {
    pub loaded: Vec<LoadReport>,
    /// Files without a classification
    pub skipped: Vec<PathBuf>,
    /// Files whose load failed, with the error message
    pub failed: Vec<(PathBuf, String)>,
}

impl DirectoryReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn rows(&self) -> u64 {
        self.loaded.iter().map(|report| report.rows).sum()
    }
}

/// Drives cycles over its collaborators
pub struct Orchestrator {
    config: IngestConfig,
    registry: SchemaRegistry,
    classifier: Classifier,
    loader: BatchLoader,
    versions: Arc<dyn VersionService>,
    fetcher: Arc<dyn ArchiveFetcher>,
    database: Arc<dyn Database>,
}

impl Orchestrator {
    pub fn new(
        config: IngestConfig,
        registry: SchemaRegistry,
        classifier: Classifier,
        versions: Arc<dyn VersionService>,
        fetcher: Arc<dyn ArchiveFetcher>,
        database: Arc<dyn Database>,
    ) -> Self {
        let loader = BatchLoader::new(config.load.shadow_threshold_bytes);
        Self {
            config,
            registry,
            classifier,
            loader,
            versions,
            fetcher,
            database,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Remote release and local marker, without touching anything
    pub async fn check(&self) -> Result<(RemoteVersion, Option<String>)> {
        let remote = self.versions.latest().await?;
        let marker = self.database.read_marker().await?;
        Ok((remote, marker))
    }

    /// Run one full cycle
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        info!("Starting ingestion cycle");

        let (remote, marker) = self.check().await?;
        let version = remote.marker();

        info!(
            remote = %version,
            text_version = %remote.text_version,
            local = marker.as_deref().unwrap_or("<none>"),
            "version check complete"
        );

        if marker.as_deref() == Some(version.as_str()) {
            info!(version = %version, "no new version");
            return Ok(CycleOutcome::Unchanged { version });
        }

        let files = self.prepare_release(&remote).await?;
        let report = self.load_files(&files).await;

        if !report.is_complete() {
            warn!(
                version = %version,
                failed = report.failed.len(),
                "release loaded with failures, version marker not updated"
            );
            return Ok(CycleOutcome::Incomplete { version, report });
        }

        self.database.write_marker(&version).await?;
        info!(
            version = %version,
            tables = report.loaded.len(),
            rows = report.rows(),
            skipped = report.skipped.len(),
            "release applied"
        );

        Ok(CycleOutcome::Applied { version, report })
    }

    /// Clear the previous download, fetch and unpack the release
    async fn prepare_release(&self, remote: &RemoteVersion) -> Result<Vec<FileDescriptor>> {
        let base_dir = self.config.base_dir.clone();
        let extract_dir = self.config.extract_dir();

        let stale = extract_dir.clone();
        tokio::task::spawn_blocking(move || unpack::clear_dir(&stale)).await??;
        tokio::fs::create_dir_all(&base_dir).await?;

        info!(url = %remote.complete_xml_url, "downloading release");
        let archive = self
            .fetcher
            .fetch(&remote.complete_xml_url, &base_dir)
            .await?;

        let classifier = self.classifier.clone();
        tokio::task::spawn_blocking(move || {
            unpack::unpack_archive(&archive, &extract_dir)?;
            std::fs::remove_file(&archive)?;
            unpack::enumerate_files(&extract_dir, &classifier)
        })
        .await?
    }

    /// Classify and load every file directly under `dir`; the marker is
    /// never read or written
    pub async fn load_directory(&self, dir: &Path) -> Result<DirectoryReport> {
        let dir = dir.to_path_buf();
        let classifier = self.classifier.clone();
        let files =
            tokio::task::spawn_blocking(move || unpack::enumerate_files(&dir, &classifier))
                .await??;

        Ok(self.load_files(&files).await)
    }

    async fn load_files(&self, files: &[FileDescriptor]) -> DirectoryReport {
        let mut report = DirectoryReport::default();

        for file in files {
            let Some(key) = file.key else {
                warn!(file = %file.file_name(), "no schema for file, skipping");
                report.skipped.push(file.path.clone());
                continue;
            };

            info!(
                file = %file.file_name(),
                key = %key,
                size = %format_bytes(file.size),
                "loading file"
            );

            match self.load_file(&file.path, key, file.size).await {
                Ok(loaded) => report.loaded.push(loaded),
                Err(e) => {
                    error!(
                        file = %file.file_name(),
                        kind = ?e.kind(),
                        error = %e,
                        "failed to load file"
                    );
                    report.failed.push((file.path.clone(), e.to_string()));
                }
            }
        }

        report
    }

    /// Load one file, classifying it unless `key` is given
    pub async fn load_path(&self, path: &Path, key: Option<SchemaKey>) -> Result<LoadReport> {
        let descriptor = FileDescriptor::describe(path, &self.classifier)?;
        let key = key
            .or(descriptor.key)
            .ok_or_else(|| IngestError::Unclassified(descriptor.file_name()))?;

        self.load_file(&descriptor.path, key, descriptor.size).await
    }

    async fn load_file(&self, path: &Path, key: SchemaKey, size: u64) -> Result<LoadReport> {
        let schema = self
            .registry
            .get(key)
            .ok_or(IngestError::UnknownSchema(key))?;

        let pb = byte_progress(
            size,
            &format!("Loading {}", path.display()),
            self.config.load.show_progress,
        )?;
        let reader = BufReader::with_capacity(64 * 1024, pb.wrap_read(File::open(path)?));
        let rows = RowExtractor::new(reader, schema);

        let mut store = self.database.open_tables().await?;
        let result = self.loader.load(store.as_mut(), schema, size, rows).await;
        pb.finish_and_clear();

        if let Err(e) = store.close().await {
            warn!(table = schema.table, error = %e, "failed to close table store");
        }

        result
    }

    /// Run cycles until `shutdown` completes during a pause between them
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let pause = match self.run_cycle().await {
                Ok(outcome) => pause_after(&self.config, &outcome),
                Err(e) => {
                    error!(kind = ?e.kind(), error = %e, "Ingestion cycle failed");
                    self.config.reload_interval()
                }
            };

            info!(secs = pause.as_secs(), "sleeping until next cycle");
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping");
                    return Ok(());
                }
            }
        }
    }
}

/// Pause chosen after `outcome`: the long idle interval when the published
/// version is already applied, the shorter reload interval once the files
/// were processed
pub fn pause_after(config: &IngestConfig, outcome: &CycleOutcome) -> Duration {
    match outcome {
        CycleOutcome::Unchanged { .. } => config.idle_interval(),
        CycleOutcome::Applied { .. } | CycleOutcome::Incomplete { .. } => {
            config.reload_interval()
        }
    }
}
