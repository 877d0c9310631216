//! Receiver: accepts messages over HTTP, persists them, and announces each
//! one on an AMQP direct exchange keyed by the message's `source`.
//!
//! Persistence always happens before the broker publish, and a failed
//! publish never rolls back the stored row. See `DESIGN.md` for details.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod publisher;
pub mod store;
