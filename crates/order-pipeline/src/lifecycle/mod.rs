//! # System Lifecycle & Orchestration
//!
//! This module manages the runtime lifecycle of the pipeline: provisioning its actors in
//! dependency order, wiring them together, and shutting them down.
//!
//! ## The Orchestration Pattern
//!
//! Individual actors are simple; **wiring them together** is where complexity lives.
//! [`PipelineSystem`] is the conductor.
//!
//! **Key Responsibilities:**
//! 1. **Actor Creation** - Instantiate all actors and their clients from one [`PipelineConfig`](crate::config::PipelineConfig)
//! 2. **Dependency Injection** - Wire actors together via context injection
//! 3. **Readiness** - Poll each component with bounded, backed-off retries before using it
//! 4. **Reconciliation** - Put the routing rule only when it is missing or differs
//! 5. **Rollback** - Abort what was already spawned when a later step fails
//! 6. **Graceful Shutdown** - Stop consuming, then let every actor drain
//!
//! ## Dependency Injection via Context
//!
//! Actors are created without dependencies and receive them through `run(context)`:
//!
//! ```rust,ignore
//! // The dead-letter queue depends on nothing
//! let (dlq_actor, dead_letter) = queue_actor::new(config.dead_letter.clone());
//! tokio::spawn(dlq_actor.run(QueueContext::default()));
//!
//! // The ingestion queue redrives into it
//! let (ingestion_actor, ingestion) = queue_actor::new(config.ingestion.clone());
//! tokio::spawn(ingestion_actor.run(QueueContext { dead_letter: Some(dead_letter.clone()) }));
//! ```
//!
//! The resulting graph is acyclic:
//!
//! ```text
//! processor ──► ingestion queue ──► dead-letter queue ◄── monitor
//!     │                                                      │
//!     └──► router ──► topic ◄────────────────────────────────┘
//!             └─────► audit queue
//! ```
//!
//! ## Graceful Shutdown
//!
//! 1. **Signal the processor** - it stops pulling and finishes the batches it holds
//! 2. **Drop all clients** - closes the sender side of every mailbox
//! 3. **Actors detect closure** - `recv()` returns `None`, `on_stop` drains pending deliveries
//! 4. **Await completion** - the shutdown cascades down the graph as contexts are dropped
//!
//! ## Observability & Tracing
//!
//! Tracing is initialised once by the binary with
//! [`actor_runtime::tracing::setup_tracing`].
//!
//! ```bash
//! RUST_LOG=info cargo run -p order-pipeline      # Compact logs
//! RUST_LOG=debug cargo run -p order-pipeline     # Every request
//! ```

pub mod error;
pub mod pipeline_system;
pub mod readiness;

pub use error::*;
pub use pipeline_system::*;
pub use readiness::*;
