//! Work fan-out coordinator.
//!
//! Every subscription event becomes two independent worker tasks:
//! 1. **invoice**: issue the invoice and enqueue it as a notification
//! 2. **document**: generate the plan manual and enqueue it as an attachment
//!
//! Both units of work are registered with the [`WorkTracker`] before either
//! task is spawned; each task owns its [`WorkGuard`] and releases it when it
//! ends, however it ends. A worker may report any number of failures.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use subscribe_common::types::{
    FailureSource, NotificationItem, Payload, PipelineState, Plan, Subscriber,
};

use crate::aggregator::ErrorReporter;
use crate::document::DocumentGenerator;
use crate::error::NotifierError;
use crate::invoice::Invoice;
use crate::queue::NotificationQueue;
use crate::tracker::{WorkGuard, WorkTracker};

/// Display name of the manual attached to the document notification.
pub const MANUAL_ATTACHMENT: &str = "Manual.pdf";

/// Per-worker behaviour switches.
#[derive(Debug, Clone)]
pub struct FulfillmentOptions {
    /// Where generated documents are written
    pub document_dir: PathBuf,
    /// Report one extra failure after each delivered manual
    pub synthetic_failure: bool,
}

/// Everything a worker task needs, shared by reference count.
pub(crate) struct DispatchContext {
    pub(crate) queue: NotificationQueue,
    pub(crate) errors: ErrorReporter,
    pub(crate) tracker: WorkTracker,
    pub(crate) documents: Arc<dyn DocumentGenerator>,
    pub(crate) options: FulfillmentOptions,
    pub(crate) state: watch::Receiver<PipelineState>,
}

/// Entry point for subscription events. Cheap to clone.
#[derive(Clone)]
pub struct Coordinator {
    ctx: Arc<DispatchContext>,
}

impl Coordinator {
    pub(crate) fn new(ctx: DispatchContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    /// Start fulfillment for one subscription and return immediately.
    ///
    /// Fails with [`NotifierError::Draining`] once shutdown has begun; no
    /// work is registered in that case.
    pub fn fulfill(&self, subscriber: Subscriber, plan: Plan) -> Result<(), NotifierError> {
        let [invoice_guard, document_guard] = self.ctx.tracker.register::<2>()?;

        tracing::info!(
            subscriber_id = %subscriber.id,
            plan_id = plan.id,
            outstanding = self.ctx.tracker.outstanding(),
            "Fulfillment started"
        );

        tokio::spawn(invoice_worker(
            Arc::clone(&self.ctx),
            invoice_guard,
            subscriber.clone(),
            plan.clone(),
        ));
        tokio::spawn(document_worker(
            Arc::clone(&self.ctx),
            document_guard,
            subscriber,
            plan,
        ));
        Ok(())
    }

    /// Number of worker tasks still running.
    pub fn outstanding(&self) -> usize {
        self.ctx.tracker.outstanding()
    }

    pub fn state(&self) -> PipelineState {
        *self.ctx.state.borrow()
    }
}

async fn invoice_worker(
    ctx: Arc<DispatchContext>,
    _guard: WorkGuard,
    subscriber: Subscriber,
    plan: Plan,
) {
    let result = async {
        let invoice = Invoice::issue(&subscriber, &plan)?;
        let data =
            serde_json::to_value(&invoice).map_err(|e| NotifierError::Invoice(e.to_string()))?;
        let item = NotificationItem::new(
            subscriber.email.as_str(),
            format!("Your invoice for {}", plan.name),
            Payload::Data(data),
        )
        .with_template("invoice");

        ctx.queue.enqueue(item).await?;
        Ok::<_, NotifierError>(invoice.number)
    }
    .await;

    match result {
        Ok(number) => tracing::debug!(
            subscriber_id = %subscriber.id,
            invoice = %number,
            "Invoice enqueued"
        ),
        Err(e) => ctx
            .errors
            .report_for(FailureSource::Invoice, &subscriber.email, e),
    }
}

async fn document_worker(
    ctx: Arc<DispatchContext>,
    _guard: WorkGuard,
    subscriber: Subscriber,
    plan: Plan,
) {
    let path = match ctx
        .documents
        .generate(&subscriber, &plan, &ctx.options.document_dir)
        .await
    {
        Ok(path) => path,
        Err(e) => {
            ctx.errors
                .report_for(FailureSource::Document, &subscriber.email, e);
            return;
        }
    };

    let item = NotificationItem::new(
        subscriber.email.as_str(),
        format!("Your {} manual", plan.name),
        Payload::Text(format!(
            "Hello {},\nYour user manual for the {} is attached.",
            subscriber.first_name, plan.name
        )),
    )
    .with_template("plain")
    .with_attachment(MANUAL_ATTACHMENT, path);

    if let Err(e) = ctx.queue.enqueue(item).await {
        ctx.errors
            .report_for(FailureSource::Document, &subscriber.email, e);
        return;
    }
    tracing::debug!(subscriber_id = %subscriber.id, "Manual enqueued");

    if ctx.options.synthetic_failure {
        ctx.errors.report_for(
            FailureSource::Synthetic,
            &subscriber.email,
            "synthetic failure after manual delivery",
        );
    }
}
