//! Pipeline assembly and the shutdown sequencer.
//!
//! ```text
//!  fulfill() ──► worker tasks ──enqueue──► NotificationQueue ──► Dispatcher ──► MailTransport
//!                    │                                              │
//!                    └──────────report──────────► ErrorAggregator ◄─┘ (send failures)
//! ```
//!
//! [`Pipeline::shutdown`] walks `Running → Draining → Stopped`:
//! 1. close the work tracker and wait for the outstanding count to reach zero
//! 2. stop the dispatcher and wait for it (releases the notification queue)
//! 3. stop the aggregator and wait for it (releases the error channel)
//!
//! The aggregator stops after the dispatcher so transport failures raised
//! while the queue drains are still aggregated. `shutdown` takes the pipeline
//! by value; every release happens exactly once, inside it.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use subscribe_common::config::AppConfig;
use subscribe_common::types::{FailurePolicy, PipelineState};

use crate::aggregator::{self, AggregateStats};
use crate::coordinator::{Coordinator, DispatchContext, FulfillmentOptions};
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::document::DocumentGenerator;
use crate::error::NotifierError;
use crate::queue::{self, DEFAULT_QUEUE_CAPACITY};
use crate::tracker::WorkTracker;
use crate::transport::MailTransport;

/// Settings for [`Pipeline::start`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub failure_policy: FailurePolicy,
    pub document_dir: PathBuf,
    pub synthetic_failure: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            failure_policy: FailurePolicy::default(),
            document_dir: PathBuf::from("./tmp"),
            synthetic_failure: false,
        }
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            queue_capacity: config.notification_queue_capacity,
            failure_policy: config.failure_policy,
            document_dir: config.document_dir.clone(),
            synthetic_failure: config.synthetic_failure,
        }
    }
}

/// Totals gathered while shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub delivered: usize,
    pub transport_failures: usize,
    pub failures_aggregated: usize,
    pub halted: bool,
}

/// The running fulfillment pipeline.
pub struct Pipeline {
    coordinator: Coordinator,
    tracker: WorkTracker,
    dispatcher: JoinHandle<DispatchStats>,
    aggregator: JoinHandle<AggregateStats>,
    stop_dispatcher: CancellationToken,
    stop_aggregator: CancellationToken,
    halt: CancellationToken,
    state: watch::Sender<PipelineState>,
}

impl Pipeline {
    /// Spawn the dispatcher and aggregator loops.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: PipelineConfig,
        transport: Arc<dyn MailTransport>,
        documents: Arc<dyn DocumentGenerator>,
    ) -> Self {
        let halt = CancellationToken::new();
        let stop_dispatcher = CancellationToken::new();
        let stop_aggregator = CancellationToken::new();
        let (state, state_rx) = watch::channel(PipelineState::Running);

        let (queue, queue_rx) = queue::channel(config.queue_capacity);
        let (errors, aggregator) = aggregator::channel(config.failure_policy, halt.clone());
        let tracker = WorkTracker::new();

        let dispatcher = Dispatcher::new(queue_rx, transport, errors.clone());
        let dispatcher = tokio::spawn(dispatcher.run(stop_dispatcher.clone()));
        let aggregator = tokio::spawn(aggregator.run(stop_aggregator.clone()));

        let coordinator = Coordinator::new(DispatchContext {
            queue,
            errors,
            tracker: tracker.clone(),
            documents,
            options: FulfillmentOptions {
                document_dir: config.document_dir,
                synthetic_failure: config.synthetic_failure,
            },
            state: state_rx,
        });

        tracing::info!(
            queue_capacity = config.queue_capacity,
            failure_policy = ?config.failure_policy,
            "Fulfillment pipeline started"
        );

        Self {
            coordinator,
            tracker,
            dispatcher,
            aggregator,
            stop_dispatcher,
            stop_aggregator,
            halt,
            state,
        }
    }

    /// Handle used to start fulfillment work.
    pub fn coordinator(&self) -> Coordinator {
        self.coordinator.clone()
    }

    /// Fired by the aggregator when a failure is fatal.
    pub fn halted(&self) -> CancellationToken {
        self.halt.clone()
    }

    pub fn state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Drain in-flight work, stop both loops and release the channels.
    ///
    /// Waits for as long as the slowest worker task takes.
    pub async fn shutdown(self) -> Result<ShutdownReport, NotifierError> {
        let Pipeline {
            coordinator,
            tracker,
            dispatcher,
            aggregator,
            stop_dispatcher,
            stop_aggregator,
            halt: _,
            state,
        } = self;

        // Close first: anyone who sees `Draining` must find fulfill refused.
        tracker.close();
        state.send_replace(PipelineState::Draining);
        tracing::info!(
            outstanding = tracker.outstanding(),
            "Draining: waiting for in-flight fulfillment work"
        );
        tracker.wait_idle().await;
        drop(coordinator);

        tracing::info!("Work drained, stopping dispatcher");
        stop_dispatcher.cancel();
        let dispatched = dispatcher.await;

        tracing::info!("Stopping error aggregator");
        stop_aggregator.cancel();
        let aggregated = aggregator.await;

        drop((stop_dispatcher, stop_aggregator));
        state.send_replace(PipelineState::Stopped);

        let dispatched = dispatched?;
        let aggregated = aggregated?;
        let report = ShutdownReport {
            delivered: dispatched.delivered,
            transport_failures: dispatched.failed,
            failures_aggregated: aggregated.failures,
            halted: aggregated.halted,
        };
        tracing::info!(?report, "Fulfillment pipeline stopped");
        Ok(report)
    }
}
