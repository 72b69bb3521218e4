//! Docket core: pure case model, page classification and run bookkeeping.
mod case;
mod classify;
mod cutoff;
mod routes;
mod summary;

pub use case::{Case, InvalidSimpleName, REJECTED_FLAG};
pub use classify::{
    classify, resolve, DownloadStrategy, PageKind, DOWNLOAD_ANCHOR_SELECTOR, MULTI_STEP_MARKER,
    PLACEHOLDER_PAGE, PLACEHOLDER_TEXT,
};
pub use cutoff::{cutoff_date, days_back};
pub use routes::PortalRoutes;
pub use summary::RunSummary;
