//! Best-effort outbound notifications.
//!
//! `Notifier::record` never blocks and never fails: messages go onto a
//! bounded queue drained by one background task, and anything that does not
//! fit is counted as dropped. Delivery failures are logged locally only.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::NotifyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    Start,
    Complete,
}

impl Severity {
    /// Syslog priority under facility local1.
    pub fn syslog_priority(self) -> u8 {
        match self {
            Severity::Info | Severity::Start => 14,
            Severity::Success | Severity::Complete => 13,
            Severity::Warning => 12,
            Severity::Error => 11,
        }
    }

    fn emoji(self) -> &'static str {
        match self {
            Severity::Info => "📋",
            Severity::Success => "✅",
            Severity::Warning => "⚠️",
            Severity::Error => "❌",
            Severity::Start => "🚀",
            Severity::Complete => "🎉",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Start => "start",
            Severity::Complete => "complete",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub source: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(String),
    #[error("notification endpoint answered {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct LogglyEntry<'a> {
    timestamp: &'a str,
    hostname: &'a str,
    level: Severity,
    script: &'a str,
    message: &'a str,
}

/// JSON log collector; the token is the last path segment of the endpoint.
pub struct LogglySink {
    client: reqwest::Client,
    endpoint: String,
    hostname: String,
}

impl LogglySink {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        token: &str,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/{}", base_url.trim_end_matches('/'), token),
            hostname: hostname.into(),
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for LogglySink {
    fn name(&self) -> &str {
        "loggly"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let entry = LogglyEntry {
            timestamp: &notification.timestamp,
            hostname: &self.hostname,
            level: notification.severity,
            script: &notification.source,
            message: &notification.message,
        };
        let body =
            serde_json::to_string(&entry).map_err(|err| NotifyError::Request(err.to_string()))?;
        post_json(&self.client, &self.endpoint, body).await
    }
}

#[derive(Serialize)]
struct WebhookMessage {
    text: String,
}

/// Chat webhook accepting `{"text": ...}`.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = WebhookMessage {
            text: format!(
                "{} **{}** [{}]\n{}",
                notification.severity.emoji(),
                notification.source,
                notification.timestamp,
                notification.message
            ),
        };
        let body =
            serde_json::to_string(&message).map_err(|err| NotifyError::Request(err.to_string()))?;
        post_json(&self.client, &self.url, body).await
    }
}

async fn post_json(client: &reqwest::Client, url: &str, body: String) -> Result<(), NotifyError> {
    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|err| NotifyError::Request(err.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotifyError::Status {
        status: status.as_u16(),
        body,
    })
}

enum Envelope {
    Deliver(Notification),
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle for recording notifications.
#[derive(Clone)]
pub struct Notifier {
    tx: Option<mpsc::Sender<Envelope>>,
    source: String,
    dropped: Arc<AtomicU64>,
}

impl Notifier {
    /// Start the delivery task on the current tokio runtime.
    pub fn spawn(
        sinks: Vec<Box<dyn NotificationSink>>,
        capacity: usize,
        source: impl Into<String>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(deliver_loop(rx, sinks));
        let notifier = Self {
            tx: Some(tx),
            source: source.into(),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (notifier, handle)
    }

    /// Build sinks from config. Without any endpoint configured, messages
    /// are only logged locally.
    pub fn from_config(config: &NotifyConfig) -> Result<(Self, Option<JoinHandle<()>>), NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|err| NotifyError::Request(err.to_string()))?;
        let hostname = config
            .hostname
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "unknown".to_string());

        let mut sinks: Vec<Box<dyn NotificationSink>> = Vec::new();
        if let (Some(url), Some(token)) = (&config.loggly_url, &config.loggly_token) {
            sinks.push(Box::new(LogglySink::new(client.clone(), url, token, hostname)));
        }
        if let Some(url) = &config.webhook_url {
            sinks.push(Box::new(WebhookSink::new(client, url.clone())));
        }

        if sinks.is_empty() {
            return Ok((Self::local_only(config.source.clone()), None));
        }
        let (notifier, handle) = Self::spawn(sinks, config.queue_capacity, config.source.clone());
        Ok((notifier, Some(handle)))
    }

    /// Log locally and deliver nowhere.
    pub fn local_only(source: impl Into<String>) -> Self {
        Self {
            tx: None,
            source: source.into(),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Record under this notifier's own source label.
    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        let source = self.source.clone();
        self.record(message, severity, &source);
    }

    /// Log `message` locally and queue it for delivery. Never blocks.
    pub fn record(&self, message: impl Into<String>, severity: Severity, source: &str) {
        let message = message.into();
        match severity {
            Severity::Error => engine_error!("{}", message),
            Severity::Warning => engine_warn!("{}", message),
            _ => engine_info!("{}", message),
        }

        let Some(tx) = &self.tx else {
            return;
        };
        let notification = Notification {
            message,
            severity,
            source: source.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        if tx.try_send(Envelope::Deliver(notification)).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Messages that never reached the queue.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Wait until everything queued so far has been attempted, or `limit`
    /// has passed. Returns whether the queue drained in time.
    pub async fn flush(&self, limit: Duration) -> bool {
        let Some(tx) = &self.tx else {
            return true;
        };
        let (done_tx, done_rx) = oneshot::channel();
        let drained = async {
            tx.send(Envelope::Flush(done_tx)).await.ok()?;
            done_rx.await.ok()
        };
        matches!(tokio::time::timeout(limit, drained).await, Ok(Some(())))
    }
}

async fn deliver_loop(mut rx: mpsc::Receiver<Envelope>, sinks: Vec<Box<dyn NotificationSink>>) {
    while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Deliver(notification) => {
                for sink in &sinks {
                    match sink.deliver(&notification).await {
                        Ok(()) => engine_debug!("Delivered notification via {}", sink.name()),
                        Err(err) => {
                            engine_warn!("Notification via {} failed: {}", sink.name(), err)
                        }
                    }
                }
            }
            Envelope::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
