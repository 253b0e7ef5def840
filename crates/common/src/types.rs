use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A subscriber, as supplied by the user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl Subscriber {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A purchasable subscription plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    /// Monthly price in cents
    pub amount_cents: i64,
}

impl Plan {
    /// Price formatted for humans, e.g. `$10.00`.
    pub fn amount_for_display(&self) -> String {
        let sign = if self.amount_cents < 0 { "-" } else { "" };
        let cents = self.amount_cents.unsigned_abs();
        format!("{}${}.{:02}", sign, cents / 100, cents % 100)
    }
}

/// Body of an outbound notification: free text or structured template data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Payload {
    Text(String),
    Data(serde_json::Value),
}

/// An outbound message waiting in the notification queue.
///
/// Built by a worker task, never mutated once enqueued, and handed to the
/// mail transport exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationItem {
    pub recipient: String,
    pub subject: String,
    /// Name of the template the transport renders the payload with
    pub template: Option<String>,
    pub payload: Payload,
    /// Display name → path of a file on local disk
    pub attachments: BTreeMap<String, PathBuf>,
}

impl NotificationItem {
    pub fn new(recipient: impl Into<String>, subject: impl Into<String>, payload: Payload) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            template: None,
            payload,
            attachments: BTreeMap::new(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_attachment(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.attachments.insert(name.into(), path.into());
        self
    }
}

/// Which part of the fulfillment pipeline produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSource {
    Invoice,
    Document,
    Transport,
    Synthetic,
}

impl std::fmt::Display for FailureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureSource::Invoice => write!(f, "invoice"),
            FailureSource::Document => write!(f, "document"),
            FailureSource::Transport => write!(f, "transport"),
            FailureSource::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// A failure reported by any asynchronous part of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub source: FailureSource,
    pub error: String,
    pub recipient: Option<String>,
    pub at: DateTime<Utc>,
}

/// How the error aggregator treats the failures it receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and halt the process (after a graceful drain).
    #[default]
    Fatal,
    /// Log the failure and keep running.
    #[serde(rename = "log")]
    LogOnly,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fatal" => Ok(FailurePolicy::Fatal),
            "log" | "log_only" => Ok(FailurePolicy::LogOnly),
            other => Err(anyhow::anyhow!(
                "FAILURE_POLICY must be `fatal` or `log`, got `{}`",
                other
            )),
        }
    }
}

/// Lifecycle of the fulfillment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Running,
    Draining,
    Stopped,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Running => write!(f, "running"),
            PipelineState::Draining => write!(f, "draining"),
            PipelineState::Stopped => write!(f, "stopped"),
        }
    }
}
