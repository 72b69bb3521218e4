#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use docket_core::{Case, REJECTED_FLAG};
use docket_engine::{
    Automation, AutomationError, AutomationPage, CaseStore, CredentialBundle, HarvestConfig,
    SelectionReset, StoreError, WaitUntil,
};
use url::Url;

pub const PORTAL: &str = "https://portal.test";

pub fn credentials() -> CredentialBundle {
    CredentialBundle::from_cookie_header(Url::parse(PORTAL).unwrap(), "SESS=fake")
}

/// Config rooted in `root` with no pacing and short waits.
pub fn test_config(root: &Path) -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.portal.base_url = PORTAL.to_string();
    config.portal.login_marker = "Signed in".to_string();
    config.paths.output_dir = root.join("output");
    config.paths.documents_dir = root.join("documents");
    config.paths.diagnostics_dir = None;
    config.timing.poll_interval_ms = 10;
    config.timing.single_step_verify_ms = 300;
    config.timing.multi_step_verify_ms = 300;
    config.timing.navigation_timeout_ms = 1_000;
    config.timing.fetch_timeout_ms = 1_000;
    config.timing.login_timeout_ms = 1_000;
    config.timing.docket_link_timeout_ms = 1_000;
    config.timing.download_trigger_timeout_ms = 1_000;
    config.timing.network_idle_timeout_ms = 1_000;
    config.timing.delay_min_ms = 0;
    config.timing.delay_max_ms = 0;
    config
}

pub fn case(court: &str, pacer_id: &str, simple_name: &str) -> Case {
    Case::new(court, pacer_id, simple_name).unwrap()
}

pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF\n".to_vec()
}

#[derive(Default)]
struct FakeState {
    login_error: Option<AutomationError>,
    listings: HashMap<String, Result<String, AutomationError>>,
    pages: HashMap<String, String>,
    downloads: HashMap<String, Vec<u8>>,
    broken: HashMap<String, AutomationError>,
    present: HashSet<String>,
    click_downloads: HashMap<String, Vec<u8>>,
    obscured: HashSet<String>,
    fetched: Vec<String>,
    navigated: Vec<String>,
    clicked: Vec<String>,
    activated: Vec<String>,
    closed: usize,
    written: usize,
}

/// Scripted portal: every URL and selector the test cares about is declared
/// up front, everything else is a 404 or a missing selector.
#[derive(Clone, Default)]
pub struct FakeAutomation {
    state: Arc<Mutex<FakeState>>,
}

impl FakeAutomation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_login(self, err: AutomationError) -> Self {
        self.state.lock().unwrap().login_error = Some(err);
        self
    }

    pub fn with_listing(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .listings
            .insert(url.into(), Ok(html.into()));
        self
    }

    pub fn with_listing_error(self, url: impl Into<String>, err: AutomationError) -> Self {
        self.state.lock().unwrap().listings.insert(url.into(), Err(err));
        self
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.state.lock().unwrap().pages.insert(url.into(), html.into());
        self
    }

    /// Navigating to `url` turns into a download of `body`.
    pub fn with_download(self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.state.lock().unwrap().downloads.insert(url.into(), body);
        self
    }

    /// Navigating to `url` fails with `err`.
    pub fn with_navigation_error(self, url: impl Into<String>, err: AutomationError) -> Self {
        self.state.lock().unwrap().broken.insert(url.into(), err);
        self
    }

    pub fn with_selector(self, selector: impl Into<String>) -> Self {
        self.state.lock().unwrap().present.insert(selector.into());
        self
    }

    /// Clicking or activating `selector` drops `body` into the download dir.
    pub fn with_click_download(self, selector: impl Into<String>, body: Vec<u8>) -> Self {
        let selector = selector.into();
        let mut state = self.state.lock().unwrap();
        state.present.insert(selector.clone());
        state.click_downloads.insert(selector, body);
        drop(state);
        self
    }

    /// User clicks on `selector` report `NotClickable`.
    pub fn obscure(self, selector: impl Into<String>) -> Self {
        self.state.lock().unwrap().obscured.insert(selector.into());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.state.lock().unwrap().fetched.clone()
    }

    pub fn navigated(&self) -> Vec<String> {
        self.state.lock().unwrap().navigated.clone()
    }

    pub fn clicked(&self) -> Vec<String> {
        self.state.lock().unwrap().clicked.clone()
    }

    pub fn activated(&self) -> Vec<String> {
        self.state.lock().unwrap().activated.clone()
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }
}

#[async_trait::async_trait]
impl Automation for FakeAutomation {
    async fn new_session(&self) -> Result<CredentialBundle, AutomationError> {
        match self.state.lock().unwrap().login_error.clone() {
            Some(err) => Err(err),
            None => Ok(credentials()),
        }
    }

    async fn fetch(
        &self,
        url: &str,
        _credentials: &CredentialBundle,
    ) -> Result<String, AutomationError> {
        let mut state = self.state.lock().unwrap();
        state.fetched.push(url.to_string());
        state
            .listings
            .get(url)
            .cloned()
            .unwrap_or(Err(AutomationError::HttpStatus(404)))
    }

    async fn open_page(
        &self,
        _credentials: &CredentialBundle,
        download_dir: &Path,
    ) -> Result<Box<dyn AutomationPage>, AutomationError> {
        Ok(Box::new(FakePage {
            state: self.state.clone(),
            download_dir: download_dir.to_path_buf(),
            current: String::new(),
        }))
    }
}

struct FakePage {
    state: Arc<Mutex<FakeState>>,
    download_dir: PathBuf,
    current: String,
}

fn drop_download(state: &mut FakeState, dir: &Path, body: &[u8]) {
    state.written += 1;
    let path = dir.join(format!("download-{}.pdf", state.written));
    fs::write(path, body).unwrap();
}

#[async_trait::async_trait]
impl AutomationPage for FakePage {
    async fn goto(&mut self, url: &str, _wait: WaitUntil) -> Result<(), AutomationError> {
        let mut state = self.state.lock().unwrap();
        state.navigated.push(url.to_string());
        if let Some(err) = state.broken.get(url).cloned() {
            return Err(err);
        }
        if let Some(body) = state.downloads.get(url).cloned() {
            drop_download(&mut state, &self.download_dir, &body);
            return Err(AutomationError::Aborted);
        }
        match state.pages.get(url) {
            Some(html) => {
                self.current = html.clone();
                Ok(())
            }
            None => Err(AutomationError::HttpStatus(404)),
        }
    }

    async fn wait_for_selector(&mut self, selector: &str) -> Result<(), AutomationError> {
        if self.state.lock().unwrap().present.contains(selector) {
            Ok(())
        } else {
            Err(AutomationError::SelectorNotFound(selector.to_string()))
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), AutomationError> {
        let mut state = self.state.lock().unwrap();
        state.clicked.push(selector.to_string());
        if state.obscured.contains(selector) {
            return Err(AutomationError::NotClickable(selector.to_string()));
        }
        if let Some(body) = state.click_downloads.get(selector).cloned() {
            drop_download(&mut state, &self.download_dir, &body);
        }
        Ok(())
    }

    async fn activate(&mut self, selector: &str) -> Result<(), AutomationError> {
        let mut state = self.state.lock().unwrap();
        state.activated.push(selector.to_string());
        if let Some(body) = state.click_downloads.get(selector).cloned() {
            drop_download(&mut state, &self.download_dir, &body);
        }
        Ok(())
    }

    async fn wait_for_network_idle(&mut self) -> Result<(), AutomationError> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String, AutomationError> {
        Ok(self.current.clone())
    }

    async fn screenshot(&mut self, _path: &Path) -> Result<(), AutomationError> {
        Err(AutomationError::Unsupported("screenshots".into()))
    }

    async fn close(&mut self) -> Result<(), AutomationError> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// In-memory stand-in for the case views.
#[derive(Default)]
pub struct MemoryCaseStore {
    cases: Mutex<Vec<Case>>,
    fail_marking: bool,
}

impl MemoryCaseStore {
    pub fn new(cases: Vec<Case>) -> Self {
        Self {
            cases: Mutex::new(cases),
            fail_marking: false,
        }
    }

    pub fn failing_marks(mut self) -> Self {
        self.fail_marking = true;
        self
    }

    pub fn get(&self, simple_name: &str) -> Option<Case> {
        self.cases
            .lock()
            .unwrap()
            .iter()
            .find(|case| case.simple_name == simple_name)
            .cloned()
    }
}

#[async_trait::async_trait]
impl CaseStore for MemoryCaseStore {
    async fn select_pending_cases(&self) -> Result<Vec<Case>, StoreError> {
        Ok(self
            .cases
            .lock()
            .unwrap()
            .iter()
            .filter(|case| case.flag_email)
            .cloned()
            .collect())
    }

    async fn mark_rejected(&self, simple_name: &str) -> Result<(), StoreError> {
        if self.fail_marking {
            return Err(StoreError::Query("store offline".into()));
        }
        for case in self.cases.lock().unwrap().iter_mut() {
            if case.simple_name == simple_name {
                case.flag_misc = REJECTED_FLAG;
            }
        }
        Ok(())
    }

    async fn reset_selection(&self, cutoff: NaiveDate) -> Result<SelectionReset, StoreError> {
        let mut cases = self.cases.lock().unwrap();
        let mut reset = SelectionReset::default();
        for case in cases.iter_mut() {
            if case.flag_email {
                reset.cleared += 1;
            }
            case.flag_email = case.date_filed.map(|d| d >= cutoff).unwrap_or(false);
            if case.flag_email {
                reset.selected += 1;
            }
        }
        Ok(reset)
    }

    async fn clear_stale_rejections(&self) -> Result<u64, StoreError> {
        let mut cleared = 0;
        for case in self.cases.lock().unwrap().iter_mut() {
            if case.flag_email && case.flag_misc == REJECTED_FLAG {
                case.flag_misc = 0;
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}
