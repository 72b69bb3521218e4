//! The two ways the portal delivers a case's combined PDF.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use docket_core::{Case, PortalRoutes};
use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::automation::{bounded, Automation, AutomationPage, CredentialBundle, WaitUntil};
use crate::config::TimingConfig;
use crate::diagnostics::Diagnostics;
use crate::persist::DocumentArtifacts;
use crate::verify::{snapshot_entries, FileArrivalVerifier};
use crate::{AutomationError, DownloadError};

pub struct Downloader<'a> {
    automation: &'a dyn Automation,
    routes: PortalRoutes,
    documents: DocumentArtifacts,
    verifier: FileArrivalVerifier,
    timing: TimingConfig,
    diagnostics: Diagnostics,
}

impl<'a> Downloader<'a> {
    pub fn new(
        automation: &'a dyn Automation,
        routes: PortalRoutes,
        documents: DocumentArtifacts,
        timing: TimingConfig,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            automation,
            routes,
            documents,
            verifier: FileArrivalVerifier::new(timing.poll_interval()),
            timing,
            diagnostics,
        }
    }

    /// Navigate straight to the document link and wait for the file.
    pub async fn single_step(
        &self,
        case: &Case,
        href: &str,
        credentials: &CredentialBundle,
    ) -> Result<PathBuf, DownloadError> {
        let url = self
            .routes
            .resolve(href)
            .map_err(|err| DownloadError::InvalidLink {
                href: href.to_string(),
                message: err.to_string(),
            })?;
        let before = snapshot_entries(self.documents.dir())?;
        let mut page = self.open_page(credentials).await?;

        let result = self
            .drive_single_step(page.as_mut(), case, url.as_str(), &before)
            .await;
        self.close_page(page, case).await;
        result
    }

    /// Filings page -> docket details -> combined-download trigger -> file.
    pub async fn multi_step(
        &self,
        case: &Case,
        credentials: &CredentialBundle,
    ) -> Result<PathBuf, DownloadError> {
        engine_info!(case = case.simple_name; "Starting multi-step download");
        let before = snapshot_entries(self.documents.dir())?;
        let mut page = self.open_page(credentials).await?;

        let result = self.drive_multi_step(page.as_mut(), case, &before).await;
        if result.is_err() {
            let stage = format!("multistep_error_{}", case.simple_name);
            self.bounded_diagnostic(self.diagnostics.screenshot(page.as_mut(), &stage))
                .await;
        }

        self.close_page(page, case).await;
        result
    }

    async fn drive_single_step(
        &self,
        page: &mut dyn AutomationPage,
        case: &Case,
        url: &str,
        before: &HashSet<OsString>,
    ) -> Result<PathBuf, DownloadError> {
        let navigation = bounded(
            "download navigation",
            self.timing.navigation_timeout(),
            page.goto(url, WaitUntil::DomContentLoaded),
        )
        .await;
        match navigation {
            Err(AutomationError::Aborted) => {
                engine_info!(case = case.simple_name; "Download triggered, verifying file");
            }
            Ok(()) => {
                engine_debug!(case = case.simple_name; "Navigation finished without abort, verifying file");
            }
            Err(err) => return Err(err.into()),
        }
        self.verify(case, before, self.timing.single_step_verify())
            .await
    }

    async fn drive_multi_step(
        &self,
        page: &mut dyn AutomationPage,
        case: &Case,
        before: &HashSet<OsString>,
    ) -> Result<PathBuf, DownloadError> {
        let timing = &self.timing;

        let filings = self.routes.filings(case);
        engine_info!(case = case.simple_name; "Step 1/4: navigating to {}", filings);
        bounded(
            "filings navigation",
            timing.navigation_timeout(),
            page.goto(filings.as_str(), WaitUntil::NetworkIdle),
        )
        .await?;
        self.snapshot(page, "filings_page").await;

        let docket_link = self.routes.docket_details_selector(case);
        engine_info!(case = case.simple_name; "Step 2/4: opening docket details");
        bounded(
            "docket details link",
            timing.docket_link_timeout(),
            page.wait_for_selector(&docket_link),
        )
        .await?;
        bounded("docket details click", timing.navigation_timeout(), page.click(&docket_link))
            .await?;
        bounded(
            "docket details network idle",
            timing.network_idle_timeout(),
            page.wait_for_network_idle(),
        )
        .await?;
        self.snapshot(page, "docket_details_page").await;

        let trigger = self.routes.combined_download_selector();
        engine_info!(case = case.simple_name; "Step 3/4: triggering combined download");
        bounded(
            "combined download trigger",
            timing.download_trigger_timeout(),
            page.wait_for_selector(trigger),
        )
        .await?;
        let clicked = bounded(
            "combined download click",
            timing.navigation_timeout(),
            page.click(trigger),
        )
        .await;
        match clicked {
            Ok(()) | Err(AutomationError::Aborted) => {}
            Err(AutomationError::NotClickable(_)) => {
                engine_info!(case = case.simple_name; "Trigger obscured, activating programmatically");
                let activated = bounded(
                    "combined download activation",
                    timing.navigation_timeout(),
                    page.activate(trigger),
                )
                .await;
                match activated {
                    Ok(()) | Err(AutomationError::Aborted) => {}
                    Err(err) => return Err(err.into()),
                }
            }
            Err(err) => return Err(err.into()),
        }

        engine_info!(case = case.simple_name; "Step 4/4: verifying download");
        self.verify(case, before, timing.multi_step_verify()).await
    }

    async fn verify(
        &self,
        case: &Case,
        before: &HashSet<OsString>,
        timeout: Duration,
    ) -> Result<PathBuf, DownloadError> {
        let target = self.documents.path_for(&case.simple_name);
        let stored = self
            .verifier
            .verify(self.documents.dir(), before, &target, timeout)
            .await?;
        Ok(stored)
    }

    async fn open_page(
        &self,
        credentials: &CredentialBundle,
    ) -> Result<Box<dyn AutomationPage>, AutomationError> {
        bounded(
            "open page",
            self.timing.navigation_timeout(),
            self.automation.open_page(credentials, self.documents.dir()),
        )
        .await
    }

    async fn close_page(&self, mut page: Box<dyn AutomationPage>, case: &Case) {
        let closed = bounded("close page", self.timing.navigation_timeout(), page.close()).await;
        if let Err(err) = closed {
            engine_warn!(case = case.simple_name; "Could not close page: {}", err);
        }
    }

    async fn snapshot(&self, page: &mut dyn AutomationPage, stage: &str) {
        self.bounded_diagnostic(self.diagnostics.snapshot(page, stage))
            .await;
    }

    async fn bounded_diagnostic<F: std::future::Future<Output = ()>>(&self, capture: F) {
        if tokio::time::timeout(self.timing.navigation_timeout(), capture)
            .await
            .is_err()
        {
            engine_warn!("Diagnostic capture timed out");
        }
    }
}
