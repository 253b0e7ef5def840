//! Test doubles for the fulfillment pipeline collaborators.
//!
//! Kept out of the production crates; only test targets depend on this one.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use subscribe_common::types::{NotificationItem, Plan, Subscriber};
use subscribe_notifier::{
    DocumentError, DocumentGenerator, MailTransport, ManualGenerator, TransportError,
};

/// Records every item it is asked to send, optionally after a delay.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<NotificationItem>>,
    delay: Duration,
}

impl RecordingTransport {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            sent: Mutex::default(),
            delay,
        }
    }

    /// Items delivered so far, in delivery order.
    pub fn sent(&self) -> Vec<NotificationItem> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, item: &NotificationItem) -> Result<(), TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(item.clone());
        }
        Ok(())
    }
}

/// Fails every send.
#[derive(Debug, Default)]
pub struct FailingTransport {
    attempts: AtomicUsize,
}

impl FailingTransport {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for FailingTransport {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn send(&self, item: &NotificationItem) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Other(format!(
            "mailbox {} unavailable",
            item.recipient
        )))
    }
}

/// Fails every generation.
#[derive(Debug, Default)]
pub struct FailingGenerator;

#[async_trait]
impl DocumentGenerator for FailingGenerator {
    async fn generate(
        &self,
        _subscriber: &Subscriber,
        plan: &Plan,
        _dir: &Path,
    ) -> Result<PathBuf, DocumentError> {
        Err(DocumentError::Render(format!("no template for {}", plan.name)))
    }
}

/// Holds every generation until the test opens the gate.
#[derive(Debug)]
pub struct GatedGenerator {
    gate: Semaphore,
    started: AtomicUsize,
    inner: ManualGenerator,
}

impl Default for GatedGenerator {
    fn default() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
            inner: ManualGenerator::new(Duration::ZERO),
        }
    }
}

impl GatedGenerator {
    /// Let `n` pending or future generations complete.
    pub fn open(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Number of generations that have started waiting on the gate.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentGenerator for GatedGenerator {
    async fn generate(
        &self,
        subscriber: &Subscriber,
        plan: &Plan,
        dir: &Path,
    ) -> Result<PathBuf, DocumentError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| DocumentError::Render(e.to_string()))?;
        permit.forget();
        self.inner.generate(subscriber, plan, dir).await
    }
}
