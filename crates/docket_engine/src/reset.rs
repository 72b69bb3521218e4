use chrono::NaiveDate;
use docket_core::cutoff_date;

use crate::notify::{Notifier, Severity};
use crate::store::{CaseStore, SelectionReset, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    pub cutoff: NaiveDate,
    pub selection: SelectionReset,
    pub rejections_cleared: u64,
}

/// Select the cases for a run started on `today`, then clear rejections on
/// the selected cases so they are attempted again.
pub async fn reset_case_flags(
    store: &dyn CaseStore,
    today: NaiveDate,
    notifier: &Notifier,
) -> Result<ResetReport, StoreError> {
    let cutoff = cutoff_date(today);
    notifier.notify(
        format!("Resetting flagEmail for cases filed on or after {cutoff}"),
        Severity::Info,
    );
    let selection = store.reset_selection(cutoff).await?;
    notifier.notify(
        format!(
            "Cleared {} previously flagged case(s); {} case(s) flagged for processing",
            selection.cleared, selection.selected
        ),
        Severity::Success,
    );

    let rejections_cleared = store.clear_stale_rejections().await?;
    notifier.notify(
        format!("{rejections_cleared} previously rejected case(s) reset"),
        Severity::Success,
    );

    Ok(ResetReport {
        cutoff,
        selection,
        rejections_cleared,
    })
}
