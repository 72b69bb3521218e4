use docket_core::Case;

use crate::persist::DocumentArtifacts;
use crate::store::{CaseStore, StoreError};

/// The cases selected for this run, loaded once from the store.
#[derive(Debug, Clone, Default)]
pub struct WorkQueue {
    cases: Vec<Case>,
}

impl WorkQueue {
    pub fn new(cases: Vec<Case>) -> Self {
        Self { cases }
    }

    pub async fn load(store: &dyn CaseStore) -> Result<Self, StoreError> {
        Ok(Self::new(store.select_pending_cases().await?))
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Case> {
        self.cases.iter()
    }

    pub fn find(&self, simple_name: &str) -> Option<&Case> {
        self.cases.iter().find(|case| case.simple_name == simple_name)
    }

    /// Split into cases still needing work and cases already stored.
    pub fn partition<'a>(&'a self, documents: &DocumentArtifacts) -> (Vec<&'a Case>, Vec<&'a Case>) {
        self.cases
            .iter()
            .partition(|case| !documents.exists(&case.simple_name))
    }
}
