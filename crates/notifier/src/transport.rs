//! Mail transports.
//!
//! The dispatcher only knows the [`MailTransport`] trait. Two transports ship
//! with the service:
//! - [`LogTransport`] writes every message to the log (development default)
//! - [`HttpMailTransport`] posts JSON to an HTTP mail API (Resend-style)

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use subscribe_common::types::{NotificationItem, Payload};

use crate::error::TransportError;

/// Delivers one notification. Called only from the dispatcher loop.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn send(&self, item: &NotificationItem) -> Result<(), TransportError>;
}

/// Sender identity stamped on every outbound message.
#[derive(Debug, Clone)]
pub struct MailSender {
    pub domain: String,
    pub from_name: String,
    pub from_address: String,
}

impl MailSender {
    pub fn mailbox(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_address)
    }
}

/// Wire body accepted by the HTTP mail API.
#[derive(Debug, Clone, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MailAttachment>,
    pub headers: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct MailAttachment {
    pub filename: String,
    /// Base64 file content
    pub content: String,
}

impl MailMessage {
    /// Render the item's template and payload into text and HTML bodies.
    ///
    /// Attachments are not read here; see [`MailMessage::attach_files`].
    pub fn render(item: &NotificationItem, sender: &MailSender) -> Self {
        let text = render_text(item);
        let html = text
            .lines()
            .map(|line| format!("<p>{}</p>", escape_html(line)))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            from: sender.mailbox(),
            to: vec![item.recipient.clone()],
            subject: item.subject.clone(),
            text,
            html,
            attachments: Vec::new(),
            headers: serde_json::json!({
                "X-Entity-Ref-ID": format!("{}@{}", uuid::Uuid::new_v4(), sender.domain),
            }),
        }
    }

    /// Read and encode every attachment of `item`.
    pub async fn attach_files(&mut self, item: &NotificationItem) -> Result<(), TransportError> {
        for (name, path) in &item.attachments {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| TransportError::Attachment {
                    name: name.clone(),
                    source,
                })?;
            self.attachments.push(MailAttachment {
                filename: name.clone(),
                content: STANDARD.encode(bytes),
            });
        }
        Ok(())
    }
}

fn render_text(item: &NotificationItem) -> String {
    match (&item.payload, item.template.as_deref()) {
        (Payload::Text(text), _) => text.clone(),
        (Payload::Data(data), Some("invoice")) => {
            let field = |key: &str| {
                data.get(key)
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .unwrap_or_else(|| "N/A".to_string())
            };
            format!(
                "Invoice {}\nPlan: {}\nAmount due: {}\nIssued: {}",
                field("number"),
                field("plan_name"),
                field("amount"),
                field("issued_at"),
            )
        }
        (Payload::Data(serde_json::Value::Object(map)), _) => map
            .iter()
            .map(|(k, v)| match v.as_str() {
                Some(s) => format!("{}: {}", k, s),
                None => format!("{}: {}", k, v),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        (Payload::Data(other), _) => other.to_string(),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Logs each message instead of sending it.
#[derive(Debug, Clone)]
pub struct LogTransport {
    sender: MailSender,
}

impl LogTransport {
    pub fn new(sender: MailSender) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl MailTransport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, item: &NotificationItem) -> Result<(), TransportError> {
        let message = MailMessage::render(item, &self.sender);
        tracing::info!(
            from = %message.from,
            to = %item.recipient,
            subject = %message.subject,
            attachments = ?item.attachments.keys().collect::<Vec<_>>(),
            body = %message.text,
            "Mail (log transport)"
        );
        Ok(())
    }
}

/// Posts messages to an HTTP mail API.
#[derive(Debug, Clone)]
pub struct HttpMailTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    sender: MailSender,
}

impl HttpMailTransport {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, sender: MailSender) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            sender,
        }
    }
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, item: &NotificationItem) -> Result<(), TransportError> {
        let mut message = MailMessage::render(item, &self.sender);
        message.attach_files(item).await?;

        let mut request = self.client.post(&self.endpoint).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
