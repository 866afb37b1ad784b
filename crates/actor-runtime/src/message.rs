//! # Generic Messages
//!
//! Request enums are defined by each component; the runtime only fixes how a request is
//! answered.

use tokio::sync::oneshot;

/// Type alias for the one-shot response channel embedded in every request.
///
/// Components that can fail answer with `Response<Result<T, TheirError>>`; the transport
/// failure (actor gone, response dropped) is reported separately as
/// [`ActorError`](crate::ActorError) by [`Mailbox::call`](crate::Mailbox::call).
pub type Response<T> = oneshot::Sender<T>;
