//! # Actor Behavior
//!
//! The trait a component implements to be driven by [`Actor`](crate::Actor).

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Trait that any stateful component must implement to run inside an [`Actor`](crate::Actor).
///
/// # Architecture Note
/// The behavior owns its state outright. The runtime hands it one request at a time, so a
/// handler can read-modify-write that state without synchronisation. Requests carry their own
/// [`Response`](crate::Response) sender; a handler answers by sending on it.
///
/// # Async & Context
/// This trait is `#[async_trait]` so handlers can await other actors (the ingestion queue
/// awaits the dead-letter queue while redriving). The `Context` type is injected into every
/// hook via [`Actor::run`](crate::Actor::run), which allows "Late Binding" of dependencies.
#[async_trait]
pub trait ActorBehavior: Send + 'static {
    /// The request enum this actor understands.
    type Request: Send + Debug + 'static;

    /// The runtime context (dependencies) injected into the actor.
    /// Use `()` if no dependencies are needed.
    type Context: Send + Sync + 'static;

    /// A human-readable instance name used in log fields (e.g. the queue name).
    fn name(&self) -> &str;

    /// Handle a single request. Called sequentially, never concurrently.
    async fn handle(&mut self, request: Self::Request, ctx: &Self::Context);

    /// Cadence for [`ActorBehavior::on_tick`]. `None` disables ticking.
    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    /// Periodic housekeeping, interleaved with requests.
    async fn on_tick(&mut self, _ctx: &Self::Context) {}

    /// Called once after the mailbox closes, before the task exits.
    async fn on_stop(&mut self, _ctx: &Self::Context) {}
}
