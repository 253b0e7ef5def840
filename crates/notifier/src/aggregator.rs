//! Error aggregator: fan-in of every asynchronous failure.
//!
//! Workers and the dispatcher never retry. They hand failures to an
//! [`ErrorReporter`] and move on; the single [`ErrorAggregator`] loop decides
//! what a failure means for the process according to its [`FailurePolicy`].

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use subscribe_common::types::{FailurePolicy, FailureRecord, FailureSource};

/// Producer handle of the error channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    tx: mpsc::UnboundedSender<FailureRecord>,
}

/// Consumer loop of the error channel.
#[derive(Debug)]
pub struct ErrorAggregator {
    rx: mpsc::UnboundedReceiver<FailureRecord>,
    policy: FailurePolicy,
    halt: CancellationToken,
}

/// What the aggregator saw over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub failures: usize,
    pub halted: bool,
}

/// Create the error channel.
///
/// `halt` is fired on the first failure when `policy` is [`FailurePolicy::Fatal`].
pub fn channel(policy: FailurePolicy, halt: CancellationToken) -> (ErrorReporter, ErrorAggregator) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ErrorReporter { tx }, ErrorAggregator { rx, policy, halt })
}

impl ErrorReporter {
    /// Report a failure. Never blocks.
    pub fn report(&self, source: FailureSource, error: impl std::fmt::Display) {
        self.send(source, None, error);
    }

    /// Report a failure tied to a recipient.
    pub fn report_for(
        &self,
        source: FailureSource,
        recipient: &str,
        error: impl std::fmt::Display,
    ) {
        self.send(source, Some(recipient.to_string()), error);
    }

    fn send(&self, source: FailureSource, recipient: Option<String>, error: impl std::fmt::Display) {
        let record = FailureRecord {
            source,
            error: error.to_string(),
            recipient,
            at: Utc::now(),
        };
        if let Err(mpsc::error::SendError(record)) = self.tx.send(record) {
            tracing::error!(
                source = %record.source,
                error = %record.error,
                "Failure reported after the error aggregator stopped"
            );
        }
    }
}

impl ErrorAggregator {
    /// Consume failures until `shutdown` fires.
    ///
    /// Records already queued when the signal fires are still handled.
    pub async fn run(mut self, shutdown: CancellationToken) -> AggregateStats {
        let mut stats = AggregateStats::default();
        tracing::info!(policy = ?self.policy, "Error aggregator started");

        loop {
            tokio::select! {
                biased;

                Some(record) = self.rx.recv() => self.handle(record, &mut stats),
                _ = shutdown.cancelled() => break,
            }
        }

        tracing::info!(
            failures = stats.failures,
            halted = stats.halted,
            "Error aggregator stopped"
        );
        stats
    }

    fn handle(&self, record: FailureRecord, stats: &mut AggregateStats) {
        stats.failures += 1;
        tracing::error!(
            source = %record.source,
            recipient = record.recipient.as_deref().unwrap_or("-"),
            at = %record.at,
            error = %record.error,
            "Fulfillment failure"
        );

        if self.policy == FailurePolicy::Fatal && !stats.halted {
            tracing::error!("Failure policy is fatal, halting the service");
            stats.halted = true;
            self.halt.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_only_counts_without_halting() {
        let halt = CancellationToken::new();
        let (reporter, aggregator) = channel(FailurePolicy::LogOnly, halt.clone());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(aggregator.run(shutdown.clone()));

        reporter.report(FailureSource::Document, "render failed");
        reporter.report_for(FailureSource::Transport, "a@b.c", "smtp down");
        reporter.report(FailureSource::Synthetic, "injected");

        shutdown.cancel();
        let stats = task.await.unwrap();
        assert_eq!(stats.failures, 3);
        assert!(!stats.halted);
        assert!(!halt.is_cancelled());
    }

    #[tokio::test]
    async fn test_fatal_policy_fires_halt_once() {
        let halt = CancellationToken::new();
        let (reporter, aggregator) = channel(FailurePolicy::Fatal, halt.clone());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(aggregator.run(shutdown.clone()));

        reporter.report(FailureSource::Invoice, "negative amount");
        halt.cancelled().await;
        reporter.report(FailureSource::Invoice, "second");

        shutdown.cancel();
        let stats = task.await.unwrap();
        assert_eq!(stats.failures, 2);
        assert!(stats.halted);
    }

    #[tokio::test]
    async fn test_report_after_stop_does_not_panic() {
        let (reporter, aggregator) = channel(FailurePolicy::LogOnly, CancellationToken::new());
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let stats = aggregator.run(shutdown).await;
        assert_eq!(stats.failures, 0);

        reporter.report(FailureSource::Transport, "late");
    }
}
