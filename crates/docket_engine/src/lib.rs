//! Docket engine: portal automation, case store, artifacts and the run pipeline.
mod automation;
mod config;
mod decode;
mod diagnostics;
mod download;
mod filename;
mod notify;
mod pacing;
mod persist;
mod pipeline;
mod portal;
mod queue;
mod reset;
mod retry;
mod session;
mod store;
mod types;
mod verify;

pub use automation::{
    bounded, Automation, AutomationPage, CredentialBundle, SessionCookie, WaitUntil,
};
pub use config::{
    ConfigError, DatabaseConfig, HarvestConfig, NotifyConfig, PathsConfig, PortalConfig,
    TimingConfig,
};
pub use decode::{decode_page, DecodedPage};
pub use diagnostics::Diagnostics;
pub use download::Downloader;
pub use filename::{download_filename, unique_in};
pub use notify::{
    LogglySink, Notification, NotificationSink, Notifier, NotifyError, Severity, WebhookSink,
};
pub use pacing::Pacer;
pub use persist::{ensure_dir, AtomicFileWriter, DocumentArtifacts, ListingArtifacts, PersistError};
pub use pipeline::Pipeline;
pub use portal::{PortalSettings, ReqwestPortal};
pub use queue::WorkQueue;
pub use reset::{reset_case_flags, ResetReport};
pub use retry::retry_until;
pub use session::open_session;
pub use store::{CaseStore, MySqlCaseStore, SelectionReset, StoreError};
pub use types::{AutomationError, CaseOutcome, DownloadError, EngineError, VerifyError};
pub use verify::{snapshot_entries, FileArrivalVerifier, IN_PROGRESS_EXT, PDF_SIGNATURE};
