use thiserror::Error;

/// Errors raised by the fulfillment pipeline itself.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Notification queue is full")]
    QueueFull,

    #[error("Notification queue is closed")]
    QueueClosed,

    #[error("Pipeline is draining; no new work accepted")]
    Draining,

    #[error("Pipeline task panicked: {0}")]
    TaskPanicked(String),

    #[error("Invoice error: {0}")]
    Invoice(String),
}

impl From<tokio::task::JoinError> for NotifierError {
    fn from(err: tokio::task::JoinError) -> Self {
        NotifierError::TaskPanicked(err.to_string())
    }
}

/// Errors returned by a [`MailTransport`](crate::transport::MailTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail API rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Attachment {name} unreadable: {source}")]
    Attachment {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    Other(String),
}

/// Errors returned by a [`DocumentGenerator`](crate::document::DocumentGenerator).
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document render error: {0}")]
    Render(String),
}
