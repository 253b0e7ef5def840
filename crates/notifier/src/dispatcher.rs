//! Dispatcher: the single consumer of the notification queue.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use subscribe_common::types::{FailureSource, NotificationItem};

use crate::aggregator::ErrorReporter;
use crate::queue::NotificationReceiver;
use crate::transport::MailTransport;

/// Delivery counters returned when the dispatcher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: usize,
    pub failed: usize,
}

/// Drains the notification queue into the mail transport, one item at a time.
pub struct Dispatcher {
    rx: NotificationReceiver,
    transport: Arc<dyn MailTransport>,
    errors: ErrorReporter,
}

impl Dispatcher {
    pub fn new(
        rx: NotificationReceiver,
        transport: Arc<dyn MailTransport>,
        errors: ErrorReporter,
    ) -> Self {
        Self {
            rx,
            transport,
            errors,
        }
    }

    /// Deliver items in enqueue order until `shutdown` fires.
    ///
    /// A ready item always wins over the shutdown signal, so items buffered
    /// before the signal are still delivered. The queue receiver is released
    /// when this returns.
    pub async fn run(mut self, shutdown: CancellationToken) -> DispatchStats {
        let mut stats = DispatchStats::default();
        tracing::info!(transport = self.transport.name(), "Dispatcher started");

        loop {
            tokio::select! {
                biased;

                Some(item) = self.rx.recv() => self.deliver(item, &mut stats).await,
                _ = shutdown.cancelled() => break,
            }
        }

        tracing::info!(
            delivered = stats.delivered,
            failed = stats.failed,
            "Dispatcher stopped"
        );
        stats
    }

    /// Single best-effort attempt; failures go to the aggregator.
    async fn deliver(&self, item: NotificationItem, stats: &mut DispatchStats) {
        match self.transport.send(&item).await {
            Ok(()) => {
                stats.delivered += 1;
                tracing::debug!(
                    recipient = %item.recipient,
                    subject = %item.subject,
                    attachments = item.attachments.len(),
                    "Notification delivered"
                );
            }
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(
                    recipient = %item.recipient,
                    subject = %item.subject,
                    error = %e,
                    "Notification delivery failed"
                );
                self.errors
                    .report_for(FailureSource::Transport, &item.recipient, e);
            }
        }
    }
}
