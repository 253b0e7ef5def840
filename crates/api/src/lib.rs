//! HTTP surface of the subscription service.
//!
//! Only the parts that feed the fulfillment pipeline live here: the plan
//! catalog, the subscribe endpoint and a health check. Everything else a
//! signup site needs (sessions, login, registration pages) sits in front of
//! this service.

pub mod catalog;
pub mod routes;
pub mod signals;
pub mod state;
