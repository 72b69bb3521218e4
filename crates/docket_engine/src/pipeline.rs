use docket_core::{classify, resolve, Case, DownloadStrategy, PageKind, PortalRoutes, RunSummary};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};

use crate::automation::{bounded, Automation, CredentialBundle};
use crate::config::{HarvestConfig, TimingConfig};
use crate::diagnostics::Diagnostics;
use crate::download::Downloader;
use crate::notify::{Notifier, Severity};
use crate::pacing::Pacer;
use crate::persist::{ensure_dir, DocumentArtifacts, ListingArtifacts};
use crate::queue::WorkQueue;
use crate::session::open_session;
use crate::store::CaseStore;
use crate::{CaseOutcome, ConfigError, DownloadError, EngineError};

/// One sequential run: login, scrape every pending listing, then work
/// through the stored listings and download what they point at.
pub struct Pipeline<'a> {
    automation: &'a dyn Automation,
    store: &'a dyn CaseStore,
    notifier: Notifier,
    routes: PortalRoutes,
    timing: TimingConfig,
    listings: ListingArtifacts,
    documents: DocumentArtifacts,
    downloader: Downloader<'a>,
    pacer: Pacer,
    fresh_listings: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &HarvestConfig,
        automation: &'a dyn Automation,
        store: &'a dyn CaseStore,
        notifier: Notifier,
    ) -> Result<Self, ConfigError> {
        let routes = config.routes()?;
        let timing = config.timing.clone();
        let documents = DocumentArtifacts::new(config.paths.documents_dir.clone());
        let diagnostics = Diagnostics::new(config.paths.diagnostics_dir.clone());
        let downloader = Downloader::new(
            automation,
            routes.clone(),
            documents.clone(),
            timing.clone(),
            diagnostics,
        );
        Ok(Self {
            automation,
            store,
            notifier,
            routes,
            pacer: Pacer::new(timing.delay_min(), timing.delay_max()),
            timing,
            listings: ListingArtifacts::new(config.paths.output_dir.clone()),
            documents,
            downloader,
            fresh_listings: config.paths.fresh_listings,
        })
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub async fn run(&self) -> Result<RunSummary, EngineError> {
        self.notifier.notify("Docket harvest started", Severity::Start);
        self.prepare_dirs()?;

        let credentials = open_session(self.automation, &self.timing).await?;
        self.notifier.notify("Portal login succeeded", Severity::Success);

        let queue = WorkQueue::load(self.store).await?;
        self.notifier
            .notify(format!("Found {} case(s) to process", queue.len()), Severity::Info);

        let mut summary = RunSummary::new();
        self.scrape_phase(&queue, &credentials, &mut summary).await?;
        self.download_phase(&queue, &credentials, &mut summary)
            .await?;

        self.notifier
            .notify(format!("Harvest complete. {summary}"), Severity::Complete);
        Ok(summary)
    }

    fn prepare_dirs(&self) -> Result<(), EngineError> {
        if self.fresh_listings {
            engine_info!("Clearing listings in {:?}", self.listings.dir());
            self.listings.clear()?;
        } else {
            ensure_dir(self.listings.dir())?;
        }
        ensure_dir(self.documents.dir())?;
        Ok(())
    }

    /// Fetch the listing page of every case that has no document yet.
    pub async fn scrape_phase(
        &self,
        queue: &WorkQueue,
        credentials: &CredentialBundle,
        summary: &mut RunSummary,
    ) -> Result<(), EngineError> {
        let (pending, stored) = queue.partition(&self.documents);
        for case in stored {
            if summary.record_skipped(&case.simple_name) {
                engine_debug!(case = case.simple_name; "Document already stored, not scraping");
            }
        }

        for case in pending {
            summary.scraped += 1;
            self.scrape_case(case, credentials, summary).await?;
            self.pacer.pause().await;
        }
        Ok(())
    }

    async fn scrape_case(
        &self,
        case: &Case,
        credentials: &CredentialBundle,
        summary: &mut RunSummary,
    ) -> Result<(), EngineError> {
        let url = self.routes.listing(case);
        engine_info!(case = case.simple_name; "Scraping {}", url);
        let fetched = bounded(
            "listing fetch",
            self.timing.fetch_timeout(),
            self.automation.fetch(url.as_str(), credentials),
        )
        .await;

        match fetched {
            Ok(html) if classify(&html) == PageKind::Placeholder => {
                summary.placeholders += 1;
                engine_info!(case = case.simple_name; "No accessible documents, nothing saved");
            }
            Ok(html) => match self.listings.save(case, &html) {
                Ok(path) => engine_debug!(case = case.simple_name; "Listing saved to {:?}", path),
                Err(err) => engine_error!(case = case.simple_name; "Could not save listing: {}", err),
            },
            Err(err) if err.is_fatal() => return Err(EngineError::Fatal(err)),
            Err(err) => engine_error!(case = case.simple_name; "Scraping failed: {}", err),
        }
        Ok(())
    }

    /// Walk the stored listings in name order and act on each one.
    pub async fn download_phase(
        &self,
        queue: &WorkQueue,
        credentials: &CredentialBundle,
        summary: &mut RunSummary,
    ) -> Result<Vec<(String, CaseOutcome)>, EngineError> {
        let mut outcomes = Vec::new();
        for name in self.listings.names()? {
            let outcome = self
                .process_listing(&name, queue, credentials, summary)
                .await?;
            if matches!(outcome, CaseOutcome::Downloaded | CaseOutcome::Failed) {
                self.pacer.pause().await;
            }
            outcomes.push((name, outcome));
        }
        Ok(outcomes)
    }

    async fn process_listing(
        &self,
        name: &str,
        queue: &WorkQueue,
        credentials: &CredentialBundle,
        summary: &mut RunSummary,
    ) -> Result<CaseOutcome, EngineError> {
        if self.documents.exists(name) {
            summary.record_skipped(name);
            return Ok(CaseOutcome::AlreadyStored);
        }
        let Some(case) = queue.find(name) else {
            engine_warn!(case = name; "Listing has no selected case, skipping");
            return Ok(CaseOutcome::MissingMetadata);
        };
        let html = match self.listings.load(name) {
            Ok(html) => html,
            Err(err) => {
                engine_error!(case = name; "Could not read listing: {}", err);
                summary.failed += 1;
                return Ok(CaseOutcome::Failed);
            }
        };

        match resolve(&html) {
            DownloadStrategy::Skip => Ok(CaseOutcome::Untouched),
            DownloadStrategy::Reject => {
                self.reject(case).await;
                summary.rejected += 1;
                Ok(CaseOutcome::Rejected)
            }
            DownloadStrategy::SingleStep(href) => {
                engine_info!(case = name; "Single-step download from {}", href);
                let result = self.downloader.single_step(case, &href, credentials).await;
                self.settle(case, result, summary)
            }
            DownloadStrategy::MultiStep => {
                let result = self.downloader.multi_step(case, credentials).await;
                self.settle(case, result, summary)
            }
        }
    }

    async fn reject(&self, case: &Case) {
        engine_info!(case = case.simple_name; "No download link, marking rejected");
        if let Err(err) = self.store.mark_rejected(&case.simple_name).await {
            engine_error!(case = case.simple_name; "Could not mark rejected: {}", err);
        }
    }

    fn settle(
        &self,
        case: &Case,
        result: Result<std::path::PathBuf, DownloadError>,
        summary: &mut RunSummary,
    ) -> Result<CaseOutcome, EngineError> {
        match result {
            Ok(path) => {
                summary.downloaded += 1;
                engine_info!(case = case.simple_name; "Document stored at {:?}", path);
                Ok(CaseOutcome::Downloaded)
            }
            Err(DownloadError::Automation(err)) if err.is_fatal() => Err(EngineError::Fatal(err)),
            Err(err) => {
                summary.failed += 1;
                engine_error!(case = case.simple_name; "Download failed: {}", err);
                Ok(CaseOutcome::Failed)
            }
        }
    }
}
