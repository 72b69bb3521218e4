//! Detects a finished browser download by watching its target directory.
//!
//! The download mechanism gives no completion callback, so arrival is
//! inferred from the directory alone: a file that was not there before the
//! download was triggered, no longer carries the in-progress extension, and
//! starts with the PDF signature.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::retry::retry_until;
use crate::VerifyError;

/// Leading bytes of every PDF.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Extension the browser gives a download until it completes.
pub const IN_PROGRESS_EXT: &str = "crdownload";

/// Filenames present in `dir` right now. Creates the directory if missing.
pub fn snapshot_entries(dir: &Path) -> Result<HashSet<OsString>, VerifyError> {
    fs::create_dir_all(dir)?;
    let mut names = HashSet::new();
    for entry in fs::read_dir(dir)? {
        names.insert(entry?.file_name());
    }
    Ok(names)
}

#[derive(Debug, Clone)]
pub struct FileArrivalVerifier {
    poll_interval: Duration,
}

impl FileArrivalVerifier {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Wait for a valid document to appear in `dir` and move it to `target`.
    ///
    /// `exclude` holds the entries that existed before the download was
    /// triggered. Candidates failing the signature check are deleted. On
    /// timeout, in-progress files that appeared during the wait are deleted.
    pub async fn verify(
        &self,
        dir: &Path,
        exclude: &HashSet<OsString>,
        target: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, VerifyError> {
        let found = retry_until(self.poll_interval, timeout, || {
            match self.scan_once(dir, exclude) {
                Ok(found) => found,
                Err(err) => {
                    engine_warn!("Listing {:?} failed: {}", dir, err);
                    None
                }
            }
        })
        .await;

        match found {
            Some(candidate) => promote(&candidate, target),
            None => {
                remove_abandoned_partials(dir, exclude);
                Err(VerifyError::Timeout { waited: timeout })
            }
        }
    }

    /// One pass over the new entries. Returns the first valid document and
    /// deletes every invalid candidate seen before it.
    fn scan_once(&self, dir: &Path, exclude: &HashSet<OsString>) -> io::Result<Option<PathBuf>> {
        for candidate in new_entries(dir, exclude)? {
            if is_in_progress(&candidate) || !candidate.is_file() {
                continue;
            }
            match has_pdf_signature(&candidate) {
                Ok(true) => {
                    engine_debug!("Found valid document {:?}", candidate);
                    return Ok(Some(candidate));
                }
                Ok(false) => {
                    engine_info!("Deleting non-PDF arrival {:?}", candidate);
                    if let Err(err) = fs::remove_file(&candidate) {
                        engine_warn!("Could not delete {:?}: {}", candidate, err);
                    }
                }
                Err(err) => {
                    engine_warn!("Could not read candidate {:?}: {}", candidate, err);
                }
            }
        }
        Ok(None)
    }
}

fn new_entries(dir: &Path, exclude: &HashSet<OsString>) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !exclude.contains(&entry.file_name()) {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_in_progress(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(IN_PROGRESS_EXT)
}

fn has_pdf_signature(path: &Path) -> io::Result<bool> {
    let mut prefix = Vec::with_capacity(PDF_SIGNATURE.len());
    File::open(path)?
        .take(PDF_SIGNATURE.len() as u64)
        .read_to_end(&mut prefix)?;
    Ok(prefix == PDF_SIGNATURE)
}

fn promote(candidate: &Path, target: &Path) -> Result<PathBuf, VerifyError> {
    if candidate == target {
        return Ok(target.to_path_buf());
    }
    if target.exists() {
        return Err(VerifyError::TargetExists(target.to_path_buf()));
    }
    fs::rename(candidate, target)?;
    engine_info!("Stored document {:?}", target);
    Ok(target.to_path_buf())
}

fn remove_abandoned_partials(dir: &Path, exclude: &HashSet<OsString>) {
    let entries = match new_entries(dir, exclude) {
        Ok(entries) => entries,
        Err(err) => {
            engine_warn!("Could not list {:?} for cleanup: {}", dir, err);
            return;
        }
    };
    for partial in entries.into_iter().filter(|p| is_in_progress(p)) {
        match fs::remove_file(&partial) {
            Ok(()) => engine_info!("Removed partial download {:?}", partial),
            Err(err) => engine_warn!("Could not remove partial {:?}: {}", partial, err),
        }
    }
}
