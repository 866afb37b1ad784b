//! # Observability & Tracing
//!
//! The [`setup_tracing`] function initializes structured logging with the `tracing` crate for
//! the whole pipeline.
//!
//! The format is compact and hides the crate/module prefix (`with_target(false)`); every log
//! line carries the component name as a structured field instead.
//!
//! ```bash
//! # Lifecycle, acknowledgments, alarms
//! RUST_LOG=info cargo run
//!
//! # Every request an actor handles, with its payload
//! RUST_LOG=debug cargo run
//! ```
//!
//! Typical `info` output for one successful order:
//!
//! ```text
//! INFO batch: Order validated order_id=ORD-001 customer_id=CUST-123 items=1 total=59.98
//! INFO batch: Event routed event_id=evt_… detail_type=ORDER_PROCESSED dispatched=2
//! INFO batch: Order processed order_id=ORD-001 message_id=msg_… receive_count=1
//! INFO batch: Batch complete successful=1 failed=0
//! INFO Published topic=OrderEvents message_id=… subject=Order ORD-001 - PROCESSED dispatched=1 withheld=0 filtered=0
//! ```

/// Installs the global subscriber. Filtering is controlled with `RUST_LOG`.
///
/// Must be called at most once per process.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // The component name travels as a field
        .compact()
        .init();
}
