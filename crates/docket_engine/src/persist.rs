use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use docket_core::Case;
use tempfile::NamedTempFile;
use thiserror::Error;

const LISTING_EXT: &str = "html";
const DOCUMENT_EXT: &str = "pdf";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("directory missing or not writable: {path:?}: {message}")]
    Dir { path: PathBuf, message: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure a directory exists and is writable; create it if missing.
pub fn ensure_dir(dir: &Path) -> Result<(), PersistError> {
    let dir_err = |message: String| PersistError::Dir {
        path: dir.to_path_buf(),
        message,
    };
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| dir_err(e.to_string()))?;
        if !meta.is_dir() {
            return Err(dir_err("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| dir_err(e.to_string()))?;
    }
    // Writability probe; the temp file is removed on drop.
    NamedTempFile::new_in(dir).map_err(|e| dir_err(e.to_string()))?;
    Ok(())
}

/// Writes `{dir}/{filename}` through a temp file and a rename, so readers
/// never see a half-written artifact.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Listing pages fetched during scraping, one `<simple_name>.html` per case.
/// They stay on disk after processing and double as a resume checkpoint.
#[derive(Debug, Clone)]
pub struct ListingArtifacts {
    dir: PathBuf,
}

impl ListingArtifacts {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, simple_name: &str) -> PathBuf {
        self.dir.join(format!("{simple_name}.{LISTING_EXT}"))
    }

    pub fn save(&self, case: &Case, content: &str) -> Result<PathBuf, PersistError> {
        AtomicFileWriter::new(self.dir.clone()).write(
            &format!("{}.{LISTING_EXT}", case.simple_name),
            content.as_bytes(),
        )
    }

    pub fn load(&self, simple_name: &str) -> Result<String, PersistError> {
        Ok(fs::read_to_string(self.path_for(simple_name))?)
    }

    /// Stems of every stored listing, sorted. A missing directory holds none.
    pub fn names(&self) -> Result<Vec<String>, PersistError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some(LISTING_EXT))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Remove every stored listing and recreate the empty directory.
    pub fn clear(&self) -> Result<(), PersistError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        ensure_dir(&self.dir)
    }
}

/// Final documents, `<simple_name>.pdf`. Presence marks a case as done.
#[derive(Debug, Clone)]
pub struct DocumentArtifacts {
    dir: PathBuf,
}

impl DocumentArtifacts {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, simple_name: &str) -> PathBuf {
        self.dir.join(format!("{simple_name}.{DOCUMENT_EXT}"))
    }

    pub fn exists(&self, simple_name: &str) -> bool {
        self.path_for(simple_name).exists()
    }
}
