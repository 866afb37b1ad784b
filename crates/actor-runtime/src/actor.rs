//! # Actor Loop
//!
//! The generic server half of every component.

use crate::behavior::ActorBehavior;
use crate::client::Mailbox;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

/// The generic actor that drives an [`ActorBehavior`].
///
/// # Architecture Note
/// This struct owns the behavior (and therefore all of the component's state) together with
/// the receiver end of the channel.
///
/// **Concurrency Model**:
/// Many actors run side by side, but each one processes its own requests *sequentially*.
/// The behavior needs no `Mutex` or `RwLock`; exclusive ownership within the task is the
/// synchronisation.
///
/// # Usage Pattern
///
/// 1.  **Create**: Call `Actor::new()` to get the `actor` (server) and its [`Mailbox`].
/// 2.  **Wire**: Pass dependencies (other clients) into `actor.run(context)`.
/// 3.  **Run**: Spawn the run loop in a background task.
///
/// # Ticks
///
/// When the behavior reports a [`tick_interval`](ActorBehavior::tick_interval) the loop
/// selects between the next request and the next tick. A tick never interrupts a request in
/// progress.
pub struct Actor<B: ActorBehavior> {
    receiver: mpsc::Receiver<B::Request>,
    behavior: B,
}

impl<B: ActorBehavior> Actor<B> {
    /// Creates a new `Actor` and its associated [`Mailbox`].
    ///
    /// # Arguments
    ///
    /// * `behavior` - The initial state of the component.
    /// * `buffer_size` - The capacity of the MPSC channel. If the channel is full,
    ///   callers wait until there is space.
    pub fn new(behavior: B, buffer_size: usize) -> (Self, Mailbox<B::Request>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self { receiver, behavior };
        (actor, Mailbox::new(sender))
    }

    /// Runs the actor's event loop until every mailbox clone has been dropped.
    ///
    /// # Context Injection
    /// The `context` argument is handed to every hook. It typically holds clients of other
    /// actors that were created after this one.
    pub async fn run(mut self, context: B::Context) {
        // Extract just the type name (e.g., "QueueState" instead of the full path)
        let actor_type = std::any::type_name::<B>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        let name = self.behavior.name().to_string();
        info!(actor_type, name = %name, "Actor started");

        let mut ticker = self.behavior.tick_interval().map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                request = self.receiver.recv() => match request {
                    Some(request) => {
                        debug!(actor_type, name = %name, ?request, "Request");
                        self.behavior.handle(request, &context).await;
                    }
                    None => break,
                },
                _ = next_tick(&mut ticker) => {
                    self.behavior.on_tick(&context).await;
                }
            }
        }

        self.behavior.on_stop(&context).await;
        info!(actor_type, name = %name, "Shutdown");
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
