use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::persist::PersistError;
use crate::store::StoreError;

/// Failures reported by the page-automation capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutomationError {
    /// Navigation was cut short because the response became a download.
    #[error("navigation aborted")]
    Aborted,
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("{operation} timed out after {limit:?}")]
    Timeout { operation: String, limit: Duration },
    #[error("selector not found: {0}")]
    SelectorNotFound(String),
    #[error("element cannot be clicked: {0}")]
    NotClickable(String),
    #[error("login verification failed")]
    LoginRejected,
    #[error("not supported by this automation backend: {0}")]
    Unsupported(String),
    #[error("download directory {path:?} unusable: {message}")]
    DownloadDir { path: PathBuf, message: String },
    /// The automation session itself is gone (protocol or connection level).
    #[error("automation transport failure: {0}")]
    Transport(String),
}

impl AutomationError {
    /// True when no further case can be processed with this session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AutomationError::Transport(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("no valid document appeared within {waited:?}")]
    Timeout { waited: Duration },
    #[error("document target already exists: {0}")]
    TargetExists(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single case's download did not produce a document.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Automation(#[from] AutomationError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error("cannot resolve download link {href:?}: {message}")]
    InvalidLink { href: String, message: String },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl DownloadError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, DownloadError::Automation(err) if err.is_fatal())
    }
}

/// Failures that end the whole run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("automation session unusable: {0}")]
    Fatal(AutomationError),
    #[error("login failed: {0}")]
    Login(AutomationError),
    #[error("case store: {0}")]
    Store(#[from] StoreError),
    #[error("artifacts: {0}")]
    Persist(#[from] PersistError),
}

/// How one case ended in the download phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseOutcome {
    Downloaded,
    Rejected,
    /// Placeholder listing, nothing to do.
    Untouched,
    AlreadyStored,
    MissingMetadata,
    Failed,
}

impl fmt::Display for CaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CaseOutcome::Downloaded => "downloaded",
            CaseOutcome::Rejected => "rejected",
            CaseOutcome::Untouched => "untouched",
            CaseOutcome::AlreadyStored => "already stored",
            CaseOutcome::MissingMetadata => "missing metadata",
            CaseOutcome::Failed => "failed",
        };
        f.write_str(label)
    }
}
