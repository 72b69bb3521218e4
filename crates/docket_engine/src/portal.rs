//! HTTP-only automation backend.
//!
//! Covers what the portal allows without running page scripts: the login
//! form, listing fetches, and link-driven downloads saved the way a browser
//! saves them (`<name>.crdownload` while streaming, renamed when complete).
//! Controls wired to `onclick` handlers cannot be activated here.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use docket_core::PortalRoutes;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE};
use scraper::{Html, Selector};
use url::Url;

use crate::automation::{Automation, AutomationPage, CredentialBundle, WaitUntil};
use crate::config::HarvestConfig;
use crate::decode::decode_page;
use crate::diagnostics::Diagnostics;
use crate::filename::{download_filename, unique_in};
use crate::verify::IN_PROGRESS_EXT;
use crate::{AutomationError, ConfigError};

#[derive(Debug, Clone)]
pub struct PortalSettings {
    pub routes: PortalRoutes,
    pub username: String,
    pub password: String,
    pub login_marker: String,
    pub login_marker_min: usize,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_page_bytes: u64,
}

impl PortalSettings {
    pub fn from_config(config: &HarvestConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            routes: config.routes()?,
            username: config.portal.username.clone(),
            password: config.portal.password.clone(),
            login_marker: config.portal.login_marker.clone(),
            login_marker_min: config.portal.login_marker_min,
            user_agent: config.portal.user_agent.clone(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: config.timing.navigation_timeout(),
            max_page_bytes: config.portal.max_page_bytes,
        })
    }
}

pub struct ReqwestPortal {
    settings: PortalSettings,
    diagnostics: Diagnostics,
}

impl ReqwestPortal {
    pub fn new(settings: PortalSettings, diagnostics: Diagnostics) -> Self {
        Self {
            settings,
            diagnostics,
        }
    }

    fn client_builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .user_agent(self.settings.user_agent.clone())
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
    }

    fn build_client(&self) -> Result<reqwest::Client, AutomationError> {
        self.client_builder()
            .build()
            .map_err(|err| AutomationError::Transport(err.to_string()))
    }

    fn marker_count(&self, html: &str) -> usize {
        html.matches(self.settings.login_marker.as_str()).count()
    }
}

#[async_trait::async_trait]
impl Automation for ReqwestPortal {
    async fn new_session(&self) -> Result<CredentialBundle, AutomationError> {
        let jar = Arc::new(Jar::default());
        let client = self
            .client_builder()
            .cookie_provider(jar.clone())
            .build()
            .map_err(|err| AutomationError::Transport(err.to_string()))?;

        let login_url = self.settings.routes.login();
        engine_info!("Navigating to login page {}", login_url);
        let response = client
            .get(login_url.clone())
            .send()
            .await
            .map_err(|err| map_reqwest_error(login_url.as_str(), err, self.settings.request_timeout))?;
        let (final_url, login_page) = read_page(
            response,
            self.settings.max_page_bytes,
            self.settings.request_timeout,
        )
        .await?;

        let form = LoginForm::parse(&login_page, &final_url).ok_or_else(|| {
            AutomationError::SelectorNotFound("login form with #edit-name and #edit-pass".into())
        })?;
        let body = form.encode(&self.settings.username, &self.settings.password);

        engine_info!("Submitting credentials");
        let response = client
            .post(form.action.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|err| {
                map_reqwest_error(form.action.as_str(), err, self.settings.request_timeout)
            })?;
        let (landing_url, landing) = read_page(
            response,
            self.settings.max_page_bytes,
            self.settings.request_timeout,
        )
        .await?;

        let seen = self.marker_count(&landing);
        if seen < self.settings.login_marker_min {
            engine_warn!(
                "Login marker seen {} time(s) on {}, need {}",
                seen,
                landing_url,
                self.settings.login_marker_min
            );
            self.diagnostics.save_html("login_page", &landing);
            return Err(AutomationError::LoginRejected);
        }

        let origin = self.settings.routes.base().clone();
        let bundle = match jar.cookies(&origin) {
            Some(header) => CredentialBundle::from_cookie_header(
                origin,
                header.to_str().unwrap_or_default(),
            ),
            None => CredentialBundle::new(origin, Vec::new()),
        };
        engine_info!("Login successful ({} cookie(s))", bundle.cookies.len());
        Ok(bundle)
    }

    async fn fetch(
        &self,
        url: &str,
        credentials: &CredentialBundle,
    ) -> Result<String, AutomationError> {
        let client = self.build_client()?;
        let response = with_cookies(client.get(url), credentials)
            .send()
            .await
            .map_err(|err| map_reqwest_error(url, err, self.settings.request_timeout))?;
        let (_, html) = read_page(
            response,
            self.settings.max_page_bytes,
            self.settings.request_timeout,
        )
        .await?;
        Ok(html)
    }

    async fn open_page(
        &self,
        credentials: &CredentialBundle,
        download_dir: &Path,
    ) -> Result<Box<dyn AutomationPage>, AutomationError> {
        fs::create_dir_all(download_dir).map_err(|err| AutomationError::DownloadDir {
            path: download_dir.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(Box::new(HttpPage {
            client: self.build_client()?,
            credentials: credentials.clone(),
            download_dir: download_dir.to_path_buf(),
            request_timeout: self.settings.request_timeout,
            max_page_bytes: self.settings.max_page_bytes,
            current_url: None,
            current: String::new(),
        }))
    }
}

struct HttpPage {
    client: reqwest::Client,
    credentials: CredentialBundle,
    download_dir: PathBuf,
    request_timeout: Duration,
    max_page_bytes: u64,
    current_url: Option<Url>,
    current: String,
}

/// First element matching a selector, reduced to what a click needs.
struct ElementInfo {
    tag: String,
    href: Option<String>,
}

impl HttpPage {
    fn find(&self, selector: &str) -> Result<Option<ElementInfo>, AutomationError> {
        let parsed = Selector::parse(selector)
            .map_err(|err| AutomationError::SelectorNotFound(format!("{selector} ({err})")))?;
        let doc = Html::parse_document(&self.current);
        let found = doc.select(&parsed).next().map(|node| ElementInfo {
            tag: node.value().name().to_ascii_lowercase(),
            href: node.value().attr("href").map(|h| h.trim().to_string()),
        });
        Ok(found)
    }

    async fn save_download(
        &self,
        url: &str,
        response: reqwest::Response,
        disposition: Option<&str>,
    ) -> Result<PathBuf, AutomationError> {
        let name = unique_in(&self.download_dir, &download_filename(disposition, url));
        let partial = self.download_dir.join(format!("{name}.{IN_PROGRESS_EXT}"));
        let io_err = |err: std::io::Error| AutomationError::Navigation {
            url: url.to_string(),
            message: format!("saving download: {err}"),
        };

        let mut file = File::create(&partial).map_err(io_err)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    // Leave the partial in place; the verifier clears it on timeout.
                    return Err(map_reqwest_error(url, err, self.request_timeout));
                }
            };
            file.write_all(&chunk).map_err(io_err)?;
        }
        file.sync_all().map_err(io_err)?;
        drop(file);

        let complete = self.download_dir.join(&name);
        fs::rename(&partial, &complete).map_err(io_err)?;
        engine_debug!("Saved download {:?}", complete);
        Ok(complete)
    }
}

#[async_trait::async_trait]
impl AutomationPage for HttpPage {
    async fn goto(&mut self, url: &str, _wait: WaitUntil) -> Result<(), AutomationError> {
        let response = with_cookies(self.client.get(url), &self.credentials)
            .send()
            .await
            .map_err(|err| map_reqwest_error(url, err, self.request_timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AutomationError::HttpStatus(status.as_u16()));
        }

        let disposition = header_str(&response, CONTENT_DISPOSITION);
        let content_type = header_str(&response, CONTENT_TYPE);
        if is_download(disposition.as_deref(), content_type.as_deref()) {
            self.save_download(url, response, disposition.as_deref())
                .await?;
            // Same signal a browser gives when navigation turns into a download.
            return Err(AutomationError::Aborted);
        }

        let (final_url, html) = read_page(response, self.max_page_bytes, self.request_timeout).await?;
        self.current_url = Some(final_url);
        self.current = html;
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str) -> Result<(), AutomationError> {
        // Static markup: the element is either there now or never.
        match self.find(selector)? {
            Some(_) => Ok(()),
            None => Err(AutomationError::SelectorNotFound(selector.to_string())),
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), AutomationError> {
        let element = self
            .find(selector)?
            .ok_or_else(|| AutomationError::SelectorNotFound(selector.to_string()))?;
        let href = match (element.tag.as_str(), element.href) {
            ("a", Some(href)) if is_navigable(&href) => href,
            _ => return Err(AutomationError::NotClickable(selector.to_string())),
        };
        let target = match &self.current_url {
            Some(base) => base.join(&href),
            None => Url::parse(&href),
        }
        .map_err(|err| AutomationError::Navigation {
            url: href.clone(),
            message: err.to_string(),
        })?;
        self.goto(target.as_str(), WaitUntil::DomContentLoaded).await
    }

    async fn activate(&mut self, selector: &str) -> Result<(), AutomationError> {
        Err(AutomationError::Unsupported(format!(
            "script activation of {selector}"
        )))
    }

    async fn wait_for_network_idle(&mut self) -> Result<(), AutomationError> {
        // Nothing runs after the document arrives.
        Ok(())
    }

    async fn content(&mut self) -> Result<String, AutomationError> {
        Ok(self.current.clone())
    }

    async fn screenshot(&mut self, _path: &Path) -> Result<(), AutomationError> {
        Err(AutomationError::Unsupported("screenshots".into()))
    }

    async fn close(&mut self) -> Result<(), AutomationError> {
        self.current.clear();
        self.current_url = None;
        Ok(())
    }
}

/// The login form's action and the fields it must carry.
struct LoginForm {
    action: Url,
    user_field: String,
    pass_field: String,
    extra: Vec<(String, String)>,
}

impl LoginForm {
    fn parse(html: &str, page_url: &Url) -> Option<Self> {
        let doc = Html::parse_document(html);
        let form_sel = Selector::parse("form").ok()?;
        let user_sel = Selector::parse("#edit-name").ok()?;
        let pass_sel = Selector::parse("#edit-pass").ok()?;
        let hidden_sel = Selector::parse("input[type=\"hidden\"]").ok()?;
        let submit_sel = Selector::parse("#edit-submit").ok()?;

        let form = doc
            .select(&form_sel)
            .find(|form| form.select(&pass_sel).next().is_some())?;
        let user_field = form.select(&user_sel).next()?.value().attr("name")?.to_string();
        let pass_field = form.select(&pass_sel).next()?.value().attr("name")?.to_string();

        let mut extra: Vec<(String, String)> = form
            .select(&hidden_sel)
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                Some((
                    name.to_string(),
                    input.value().attr("value").unwrap_or_default().to_string(),
                ))
            })
            .collect();
        if let Some(submit) = form.select(&submit_sel).next() {
            if let Some(name) = submit.value().attr("name") {
                extra.push((
                    name.to_string(),
                    submit.value().attr("value").unwrap_or_default().to_string(),
                ));
            }
        }

        let action = match form.value().attr("action").map(str::trim) {
            Some(action) if !action.is_empty() => page_url.join(action).ok()?,
            _ => page_url.clone(),
        };

        Some(Self {
            action,
            user_field,
            pass_field,
            extra,
        })
    }

    fn encode(&self, username: &str, password: &str) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        serializer.append_pair(&self.user_field, username);
        serializer.append_pair(&self.pass_field, password);
        for (name, value) in &self.extra {
            serializer.append_pair(name, value);
        }
        serializer.finish()
    }
}

fn with_cookies(request: reqwest::RequestBuilder, credentials: &CredentialBundle) -> reqwest::RequestBuilder {
    match credentials.cookie_header() {
        Some(header) => request.header(COOKIE, header),
        None => request,
    }
}

fn header_str(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn is_download(disposition: Option<&str>, content_type: Option<&str>) -> bool {
    if disposition
        .map(|d| d.trim_start().to_ascii_lowercase().starts_with("attachment"))
        .unwrap_or(false)
    {
        return true;
    }
    match content_type {
        Some(ct) => {
            let essence = ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase();
            !matches!(essence.as_str(), "text/html" | "application/xhtml+xml" | "text/plain")
        }
        None => false,
    }
}

fn is_navigable(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    !href.is_empty() && !lower.starts_with('#') && !lower.starts_with("javascript:")
}

/// Read a successful page response within the size limit and decode it.
async fn read_page(
    response: reqwest::Response,
    max_bytes: u64,
    limit: Duration,
) -> Result<(Url, String), AutomationError> {
    let url = response.url().clone();
    let status = response.status();
    if !status.is_success() {
        return Err(AutomationError::HttpStatus(status.as_u16()));
    }
    let content_type = header_str(&response, CONTENT_TYPE);

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| map_reqwest_error(url.as_str(), err, limit))?;
        if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
            return Err(AutomationError::Navigation {
                url: url.to_string(),
                message: format!("page larger than {max_bytes} bytes"),
            });
        }
        bytes.extend_from_slice(&chunk);
    }
    let page = decode_page(&bytes, content_type.as_deref());
    Ok((url, page.html))
}

/// Connection-level failures end the session; everything else stays with the case.
fn map_reqwest_error(url: &str, err: reqwest::Error, limit: Duration) -> AutomationError {
    if is_connection_loss(&err) {
        return AutomationError::Transport(format!("{url}: {err}"));
    }
    if err.is_timeout() {
        return AutomationError::Timeout {
            operation: format!("request to {url}"),
            limit,
        };
    }
    AutomationError::Navigation {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn is_connection_loss(err: &reqwest::Error) -> bool {
    if err.is_connect() {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::NotConnected
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
