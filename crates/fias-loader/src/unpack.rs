//! Archive unpacking and member enumeration
//!
//! # Supported Formats
//!
//! - **Zip** (.zip): Using zip
//! - **Tar** (.tar): Using tar
//! - **Tar.gz** (.tar.gz, .tgz): Combined gzip + tar
//!
//! Members are streamed to disk and flattened to their file names; directory
//! structure inside the archive is not kept. Everything here is blocking and
//! is meant to run under `tokio::task::spawn_blocking`.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, info};

use crate::classifier::Classifier;
use crate::error::{IngestError, Result};
use crate::schema::SchemaKey;

/// One member of an unpacked release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub path: PathBuf,
    pub key: Option<SchemaKey>,
    pub size: u64,
}

impl FileDescriptor {
    /// Describe `path`, classifying it with `classifier`
    pub fn describe(path: &Path, classifier: &Classifier) -> Result<Self> {
        let size = fs::metadata(path)?.len();
        Ok(Self {
            path: path.to_path_buf(),
            key: classifier.classify_path(path),
            size,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveFormat {
    fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }
}

/// Unpack `archive` into `dest`, returning the number of files written
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<usize> {
    let format = ArchiveFormat::detect(archive).ok_or_else(|| {
        IngestError::Archive(format!("unsupported archive format: {}", archive.display()))
    })?;

    fs::create_dir_all(dest)?;
    let file = BufReader::new(File::open(archive)?);

    let written = match format {
        ArchiveFormat::Zip => unpack_zip(file, dest)?,
        ArchiveFormat::Tar => unpack_tar(file, dest)?,
        ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(file), dest)?,
    };

    info!(
        archive = %archive.display(),
        dest = %dest.display(),
        files = written,
        "archive unpacked"
    );
    Ok(written)
}

fn unpack_zip<R: io::Read + io::Seek>(reader: R, dest: &Path) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        let Some(target) = entry
            .enclosed_name()
            .and_then(|name| flattened(&name, dest))
        else {
            debug!(name = entry.name(), "skipping archive member without a usable name");
            continue;
        };

        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    Ok(written)
}

fn unpack_tar<R: io::Read>(reader: R, dest: &Path) -> Result<usize> {
    let mut archive = tar::Archive::new(reader);
    let mut written = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path()?.into_owned();
        let Some(target) = flattened(&path, dest) else {
            debug!(name = %path.display(), "skipping archive member without a usable name");
            continue;
        };

        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    Ok(written)
}

fn flattened(member: &Path, dest: &Path) -> Option<PathBuf> {
    member.file_name().map(|name| dest.join(name))
}

/// Every regular file directly under `dir`, classified and sorted by name
pub fn enumerate_files(dir: &Path, classifier: &Classifier) -> Result<Vec<FileDescriptor>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(FileDescriptor::describe(&entry.path(), classifier)?);
        }
    }

    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(files)
}

/// Remove `path` and everything under it, if present
pub fn clear_dir(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
