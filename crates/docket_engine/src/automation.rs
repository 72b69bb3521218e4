use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::AutomationError;

/// A cookie captured at login.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Session state obtained once per run and handed by value to every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub origin: Url,
    pub cookies: Vec<SessionCookie>,
}

impl CredentialBundle {
    pub fn new(origin: Url, cookies: Vec<SessionCookie>) -> Self {
        Self { origin, cookies }
    }

    /// Parse a `Cookie` request header (`a=1; b=2`).
    pub fn from_cookie_header(origin: Url, header: &str) -> Self {
        let cookies = header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                (!name.is_empty()).then(|| SessionCookie {
                    name: name.to_string(),
                    value: value.trim().to_string(),
                })
            })
            .collect();
        Self { origin, cookies }
    }

    /// The `Cookie` header value, if there is anything to send.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        Some(pairs.join("; "))
    }
}

/// How long `goto` waits before it considers a page loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    DomContentLoaded,
    NetworkIdle,
}

/// The authenticated page-automation capability.
#[async_trait::async_trait]
pub trait Automation: Send + Sync {
    /// Log in and capture the session.
    async fn new_session(&self) -> Result<CredentialBundle, AutomationError>;

    /// Load `url` and return its markup.
    async fn fetch(&self, url: &str, credentials: &CredentialBundle)
        -> Result<String, AutomationError>;

    /// Open a page carrying `credentials` whose downloads land in `download_dir`.
    async fn open_page(
        &self,
        credentials: &CredentialBundle,
        download_dir: &Path,
    ) -> Result<Box<dyn AutomationPage>, AutomationError>;
}

/// One open page. `goto` returns `AutomationError::Aborted` when the
/// response turned into a download instead of a document.
#[async_trait::async_trait]
pub trait AutomationPage: Send {
    async fn goto(&mut self, url: &str, wait: WaitUntil) -> Result<(), AutomationError>;

    /// Succeeds once `selector` matches; the caller bounds the wait.
    async fn wait_for_selector(&mut self, selector: &str) -> Result<(), AutomationError>;

    /// Dispatch a user click. `NotClickable` when the element cannot receive it.
    async fn click(&mut self, selector: &str) -> Result<(), AutomationError>;

    /// Activate the element programmatically, bypassing hit testing.
    async fn activate(&mut self, selector: &str) -> Result<(), AutomationError>;

    async fn wait_for_network_idle(&mut self) -> Result<(), AutomationError>;

    async fn content(&mut self) -> Result<String, AutomationError>;

    async fn screenshot(&mut self, path: &Path) -> Result<(), AutomationError>;

    async fn close(&mut self) -> Result<(), AutomationError>;
}

/// Give one automation call its own time budget.
pub async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> Result<T, AutomationError>
where
    F: Future<Output = Result<T, AutomationError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AutomationError::Timeout {
            operation: operation.to_string(),
            limit,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_round_trips_pairs() {
        let origin = Url::parse("https://portal.example.com").unwrap();
        let bundle = CredentialBundle::from_cookie_header(origin, "SESS1=abc; has_js=1; =bad");
        assert_eq!(bundle.cookies.len(), 2);
        assert_eq!(bundle.cookie_header().as_deref(), Some("SESS1=abc; has_js=1"));
    }

    #[test]
    fn debug_output_hides_cookie_values() {
        let origin = Url::parse("https://portal.example.com").unwrap();
        let bundle = CredentialBundle::from_cookie_header(origin, "SESS1=secret");
        let printed = format!("{bundle:?}");
        assert!(printed.contains("SESS1"));
        assert!(!printed.contains("secret"));
    }

    #[tokio::test]
    async fn bounded_reports_operation_on_timeout() {
        let err = bounded("slow op", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), AutomationError>(())
        })
        .await
        .unwrap_err();
        assert_eq!(
            err,
            AutomationError::Timeout {
                operation: "slow op".to_string(),
                limit: Duration::from_millis(10)
            }
        );
    }
}
