//! Owner notifications.
//!
//! One message per published partition. Delivery goes through [`Notifier`];
//! the outbox backend appends messages to a JSONL file, the http backend
//! posts them to a mail API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{NotifyBackend, NotifyConfig};
use crate::error::{Error, Result};
use crate::secrets::SecretStore;
use crate::storage::append_jsonl;

/// A summary mail for one owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl Notification {
    /// Build the weekly summary for an object published under `key`.
    pub fn summary(from: &str, to: &str, key: &str, row_count: usize) -> Self {
        let html = format!(
            "<html>\n<body>\n    <p>There are {row_count} actions that need to be completed this week.</p>\n    \
             <p>Report: {key}</p>\n    <p>Best regards,</p>\n    \
             <p>Contact your representative with any questions.</p>\n</body>\n</html>\n"
        );
        let text = format!(
            "There are {row_count} actions that need to be completed this week.\n\n\
             Report: {key}\n\nBest regards,\n\nContact your representative with any questions."
        );
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: format!("CSV Report {key}"),
            html,
            text,
        }
    }
}

/// Delivery of notifications
pub trait Notifier {
    fn send(&self, notification: &Notification) -> Result<()>;
}

/// Outbox record as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub message_id: Uuid,
    pub queued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub notification: Notification,
}

/// Appends notifications to a JSONL outbox file
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    path: PathBuf,
}

impl OutboxNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every queued message
    pub fn read_all(&self) -> Result<Vec<OutboxEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }
}

impl Notifier for OutboxNotifier {
    fn send(&self, notification: &Notification) -> Result<()> {
        let entry = OutboxEntry {
            message_id: Uuid::new_v4(),
            queued_at: Utc::now(),
            notification: notification.clone(),
        };
        append_jsonl(&self.path, &entry)?;
        tracing::info!(to = %notification.to, subject = %notification.subject, "notification queued");
        Ok(())
    }
}

/// Posts notifications as JSON to a mail API
pub struct HttpNotifier {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }
}

impl Notifier for HttpNotifier {
    fn send(&self, notification: &Notification) -> Result<()> {
        let body = SendRequest {
            from: &notification.from,
            to: [&notification.to],
            subject: &notification.subject,
            html: &notification.html,
            text: &notification.text,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().unwrap_or_default();
            return Err(Error::Notify(format!(
                "{} returned {status}: {}",
                self.endpoint,
                detail.chars().take(200).collect::<String>()
            )));
        }

        tracing::info!(to = %notification.to, subject = %notification.subject, %status, "notification sent");
        Ok(())
    }
}

/// Open the configured notifier. Relative outbox paths resolve against
/// `base_dir`.
pub fn open(config: &NotifyConfig, secrets: &dyn SecretStore, base_dir: &Path) -> Result<Box<dyn Notifier>> {
    match config.backend {
        NotifyBackend::Outbox => Ok(Box::new(OutboxNotifier::new(base_dir.join(&config.outbox)))),
        NotifyBackend::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| Error::InvalidConfig("notify.endpoint is required".to_string()))?;
            let token = secrets.get(&config.token_secret)?;
            Ok(Box::new(HttpNotifier::new(
                endpoint,
                token,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}
