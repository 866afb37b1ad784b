use crate::{ActorError, Mailbox, Response};
use async_trait::async_trait;

/// Trait for component-specific clients built on top of a [`Mailbox`].
///
/// A client wraps the raw mailbox, exposes domain methods, and maps transport failures into
/// its own error type. Implementors only supply the mailbox and the error mapping; the
/// request plumbing is provided.
///
/// # Example
///
/// ```rust
/// use actor_runtime::{ActorClient, ActorError, Mailbox, Response};
///
/// #[derive(Debug)]
/// enum PingRequest { Ping { respond_to: Response<&'static str> } }
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("ping failed: {0}")]
/// struct PingError(#[from] ActorError);
///
/// struct PingClient { mailbox: Mailbox<PingRequest> }
///
/// impl ActorClient for PingClient {
///     type Request = PingRequest;
///     type Error = PingError;
///
///     fn mailbox(&self) -> &Mailbox<PingRequest> { &self.mailbox }
///
///     fn map_error(e: ActorError) -> PingError { PingError(e) }
/// }
///
/// async fn usage(client: PingClient) -> Result<&'static str, PingError> {
///     client.request(|respond_to| PingRequest::Ping { respond_to }).await
/// }
/// ```
#[async_trait]
pub trait ActorClient: Send + Sync {
    /// The request enum of the actor behind this client.
    type Request: Send + 'static;

    /// The component-specific error type.
    type Error: Send;

    /// Access the underlying mailbox.
    fn mailbox(&self) -> &Mailbox<Self::Request>;

    /// Map runtime errors to the component's error type.
    fn map_error(e: ActorError) -> Self::Error;

    /// Send a request and await the reply, mapping transport failures.
    async fn request<T, F>(&self, make: F) -> Result<T, Self::Error>
    where
        T: Send + 'static,
        F: FnOnce(Response<T>) -> Self::Request + Send + 'static,
    {
        tracing::trace!("Sending request");
        self.mailbox().call(make).await.map_err(Self::map_error)
    }

    /// True while the actor is still accepting requests.
    fn is_running(&self) -> bool {
        !self.mailbox().is_closed()
    }
}
