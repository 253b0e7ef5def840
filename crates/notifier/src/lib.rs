//! Subscription fulfillment pipeline.
//!
//! When a subscriber picks a plan, the HTTP handler calls
//! [`Coordinator::fulfill`] and answers immediately. Fulfillment continues in
//! the background:
//! - two worker tasks build an invoice notification and a manual notification
//! - a bounded [`NotificationQueue`] carries them to the single [`Dispatcher`]
//! - every asynchronous failure funnels into the [`ErrorAggregator`]
//! - [`Pipeline::shutdown`] drains in-flight work before anything is released
//!
//! Delivery is best-effort: nothing is persisted and nothing is retried.

pub mod aggregator;
pub mod coordinator;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod invoice;
pub mod pipeline;
pub mod queue;
pub mod tracker;
pub mod transport;

pub use aggregator::{AggregateStats, ErrorAggregator, ErrorReporter};
pub use coordinator::{Coordinator, FulfillmentOptions, MANUAL_ATTACHMENT};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use document::{DocumentGenerator, ManualGenerator};
pub use error::{DocumentError, NotifierError, TransportError};
pub use pipeline::{Pipeline, PipelineConfig, ShutdownReport};
pub use queue::{DEFAULT_QUEUE_CAPACITY, NotificationQueue};
pub use tracker::{WorkGuard, WorkTracker};
pub use transport::{HttpMailTransport, LogTransport, MailSender, MailTransport};
