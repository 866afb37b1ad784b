//! # Order Pipeline Library
//!
//! The asynchronous backbone of an order-fulfillment pipeline, built from actors:
//!
//! ```text
//! producer ──► ingestion queue ──► processor ──► router ──┬──► topic ──► subscribers
//!                    │                                    └──► audit queue
//!                    └── exhausted retries ──► dead-letter queue ◄── monitor
//! ```
//!
//! - **[queue_actor]**: at-least-once queue with visibility leases and redrive
//! - **[processor]**: batch consumer with partial-failure reporting and idempotency markers
//! - **[router_actor]**: rule-matching event bus with retrying per-target delivery
//! - **[topic_actor]**: fanout with confirmation handshake and filter policies
//! - **[monitor_actor]**: dead-letter depth alarm
//! - **[audit]**: read side of the audit queue
//! - **[lifecycle]**: provisioning, readiness, rollback and shutdown
//!
//! This library exposes the modules for the binary and for integration testing.

pub mod audit;
pub mod clients;
pub mod config;
pub mod lifecycle;
pub mod model;
pub mod monitor_actor;
pub mod processor;
pub mod queue_actor;
pub mod router_actor;
pub mod topic_actor;
