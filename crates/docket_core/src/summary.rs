use std::collections::BTreeSet;
use std::fmt;

/// Counters accumulated over one run and reported at its end.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Listing fetches attempted.
    pub scraped: u32,
    /// Listing pages that were the no-documents placeholder.
    pub placeholders: u32,
    /// Documents verified and stored.
    pub downloaded: u32,
    pub rejected: u32,
    /// Cases with a stored document, counted once per run.
    pub skipped: u32,
    /// Download attempts that ended without a document.
    pub failed: u32,
    skipped_names: BTreeSet<String>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an already-downloaded case. Returns false if this run has
    /// already counted it.
    pub fn record_skipped(&mut self, simple_name: &str) -> bool {
        if !self.skipped_names.insert(simple_name.to_string()) {
            return false;
        }
        self.skipped += 1;
        true
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Success: {}, Rejected: {}, Skipped: {}, Failed: {} (scraped {}, placeholders {})",
            self.downloaded, self.rejected, self.skipped, self.failed, self.scraped, self.placeholders
        )
    }
}
