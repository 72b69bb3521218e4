use std::path::PathBuf;

use engine_logging::{engine_debug, engine_warn};

use crate::automation::AutomationPage;
use crate::persist::AtomicFileWriter;

/// Best-effort page snapshots for debugging selector drift offline.
/// Failures are logged and never returned.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    dir: Option<PathBuf>,
}

impl Diagnostics {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn save_html(&self, stage: &str, html: &str) {
        let Some(dir) = &self.dir else {
            return;
        };
        let writer = AtomicFileWriter::new(dir.clone());
        match writer.write(&format!("{stage}.html"), html.as_bytes()) {
            Ok(path) => engine_debug!("Saved snapshot {:?}", path),
            Err(err) => engine_warn!("Could not save {} snapshot: {}", stage, err),
        }
    }

    /// Page markup plus a full screenshot.
    pub async fn snapshot(&self, page: &mut dyn AutomationPage, stage: &str) {
        if self.dir.is_none() {
            return;
        }
        match page.content().await {
            Ok(html) => self.save_html(stage, &html),
            Err(err) => engine_warn!("Could not read page for {} snapshot: {}", stage, err),
        }
        self.screenshot(page, stage).await;
    }

    pub async fn screenshot(&self, page: &mut dyn AutomationPage, stage: &str) {
        let Some(dir) = &self.dir else {
            return;
        };
        if let Err(err) = std::fs::create_dir_all(dir) {
            engine_warn!("Could not create {:?}: {}", dir, err);
            return;
        }
        let path = dir.join(format!("{stage}.png"));
        if let Err(err) = page.screenshot(&path).await {
            engine_debug!("No screenshot for {}: {}", stage, err);
        }
    }
}
