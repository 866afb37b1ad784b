//! # Mailbox
//!
//! The sending half of an actor: a cheap, cloneable handle that turns a request enum into an
//! awaited reply.

use crate::error::ActorError;
use crate::message::Response;
use tokio::sync::{mpsc, oneshot};

/// ## Mailbox
///
/// The `Mailbox<R>` forwards requests of type `R` over a Tokio mpsc channel and awaits the
/// reply on a oneshot channel created per call.
///
/// * **Cloneable** – holds only a sender, so cloning is inexpensive.
/// * **Backpressure** – when the channel is full, `call` waits for space.
/// * **Shutdown** – once every clone is dropped the actor's loop ends.
#[derive(Debug)]
pub struct Mailbox<R> {
    sender: mpsc::Sender<R>,
}

impl<R> Clone for Mailbox<R> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<R: Send + 'static> Mailbox<R> {
    pub fn new(sender: mpsc::Sender<R>) -> Self {
        Self { sender }
    }

    /// Sends a request built around a fresh response channel and waits for the answer.
    pub async fn call<T, F>(&self, make: F) -> Result<T, ActorError>
    where
        F: FnOnce(Response<T>) -> R,
    {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(make(respond_to))
            .await
            .map_err(|_| ActorError::ActorClosed)?;
        response.await.map_err(|_| ActorError::ActorDropped)
    }

    /// Sends a request without waiting for a reply.
    pub async fn tell(&self, request: R) -> Result<(), ActorError> {
        self.sender
            .send(request)
            .await
            .map_err(|_| ActorError::ActorClosed)
    }

    /// True once the actor's loop has exited.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
