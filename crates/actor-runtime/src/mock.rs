//! # Mock Mailbox & Testing Guide
//!
//! [`MockMailbox<R>`] hands out a real [`Mailbox<R>`] whose requests are answered by a
//! scripted list of expectations instead of a running actor. Code that depends on a client
//! (the order processor depends on the router and the queues) can therefore be tested with
//! injected successes, failures and delays, without spawning the real component.
//!
//! ## When to use Mocks vs Real Actors
//!
//! | Feature | MockMailbox | Real Actor |
//! |---------|-------------|------------|
//! | **Speed** | Instant (in-memory) | Fast (but involves tokio spawn) |
//! | **Determinism** | Fully scripted | Subject to scheduler |
//! | **State** | None (expectations) | Real state management |
//! | **Error Injection** | Easy (answer with `Err`) | Hard (requires specific state) |
//!
//! ## Example
//!
//! ```rust
//! use actor_runtime::mock::MockMailbox;
//! use actor_runtime::Response;
//!
//! #[derive(Debug)]
//! enum Request { Depth { respond_to: Response<usize> } }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = MockMailbox::<Request>::new();
//!     mock.expect("depth", |request| match request {
//!         Request::Depth { respond_to } => { let _ = respond_to.send(3); }
//!     });
//!
//!     let depth = mock
//!         .mailbox()
//!         .call(|respond_to| Request::Depth { respond_to })
//!         .await
//!         .unwrap();
//!     assert_eq!(depth, 3);
//!     mock.verify();
//! }
//! ```
//!
//! A request that arrives when no expectation is left is recorded and dropped; the caller
//! observes [`ActorError::ActorDropped`](crate::ActorError::ActorDropped) and
//! [`MockMailbox::verify`] fails.

use crate::client::Mailbox;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type Handler<R> = Box<dyn FnOnce(R) + Send>;

struct Expectation<R> {
    label: &'static str,
    handler: Handler<R>,
}

/// A mailbox backed by scripted expectations, consumed in order.
pub struct MockMailbox<R> {
    mailbox: Mailbox<R>,
    expectations: Arc<Mutex<VecDeque<Expectation<R>>>>,
    unexpected: Arc<Mutex<Vec<String>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl<R: Send + Debug + 'static> Default for MockMailbox<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send + Debug + 'static> MockMailbox<R> {
    /// Creates a mock with no expectations. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<R>(100);
        let expectations: Arc<Mutex<VecDeque<Expectation<R>>>> =
            Arc::new(Mutex::new(VecDeque::new()));
        let unexpected = Arc::new(Mutex::new(Vec::new()));
        let expectations_clone = expectations.clone();
        let unexpected_clone = unexpected.clone();

        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let next = expectations_clone.lock().unwrap().pop_front();
                match next {
                    Some(expectation) => (expectation.handler)(request),
                    None => unexpected_clone
                        .lock()
                        .unwrap()
                        .push(format!("{request:?}")),
                }
            }
        });

        Self {
            mailbox: Mailbox::new(sender),
            expectations,
            unexpected,
            _handle: handle,
        }
    }

    /// Returns a mailbox for use in tests.
    pub fn mailbox(&self) -> Mailbox<R> {
        self.mailbox.clone()
    }

    /// Queues the handler for the next request. The handler answers on the request's
    /// response channel (or drops it to simulate a crashed actor).
    pub fn expect<F>(&self, label: &'static str, handler: F)
    where
        F: FnOnce(R) + Send + 'static,
    {
        self.expectations.lock().unwrap().push_back(Expectation {
            label,
            handler: Box::new(handler),
        });
    }

    /// Number of expectations not yet consumed.
    pub fn remaining(&self) -> usize {
        self.expectations.lock().unwrap().len()
    }

    /// Verifies that all expectations were met and nothing unexpected arrived.
    pub fn verify(&self) {
        let unexpected = self.unexpected.lock().unwrap();
        if !unexpected.is_empty() {
            panic!("Unexpected requests: {:?}", *unexpected);
        }
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            let labels: Vec<_> = exps.iter().map(|e| e.label).collect();
            panic!("Not all expectations were met. Remaining: {labels:?}");
        }
    }
}

/// Creates a mailbox and the raw receiver behind it.
///
/// Useful when a test wants to inspect requests one by one and decide the answer inline,
/// e.g. to hold a reply back while asserting on concurrent behaviour.
pub fn create_mock_mailbox<R: Send + 'static>(
    buffer_size: usize,
) -> (Mailbox<R>, mpsc::Receiver<R>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (Mailbox::new(sender), receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActorError, Response};

    #[derive(Debug)]
    enum StockRequest {
        Check {
            sku: String,
            respond_to: Response<Result<u32, String>>,
        },
    }

    #[tokio::test]
    async fn test_mock_mailbox_with_expectations() {
        let mock = MockMailbox::<StockRequest>::new();
        mock.expect("check widget", |request| match request {
            StockRequest::Check { sku, respond_to } => {
                assert_eq!(sku, "widget");
                let _ = respond_to.send(Ok(7));
            }
        });
        mock.expect("check gadget", |request| match request {
            StockRequest::Check { respond_to, .. } => {
                let _ = respond_to.send(Err("out of stock".to_string()));
            }
        });

        let mailbox = mock.mailbox();
        let first = mailbox
            .call(|respond_to| StockRequest::Check {
                sku: "widget".into(),
                respond_to,
            })
            .await
            .unwrap();
        assert_eq!(first, Ok(7));

        let second = mailbox
            .call(|respond_to| StockRequest::Check {
                sku: "gadget".into(),
                respond_to,
            })
            .await
            .unwrap();
        assert_eq!(second, Err("out of stock".to_string()));

        mock.verify();
    }

    #[tokio::test]
    async fn test_unexpected_request_is_dropped() {
        let mock = MockMailbox::<StockRequest>::new();
        let result = mock
            .mailbox()
            .call(|respond_to| StockRequest::Check {
                sku: "widget".into(),
                respond_to,
            })
            .await;
        assert_eq!(result, Err(ActorError::ActorDropped));
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn test_raw_mock_mailbox() {
        let (mailbox, mut receiver) = create_mock_mailbox::<StockRequest>(4);

        let task = tokio::spawn(async move {
            mailbox
                .call(|respond_to| StockRequest::Check {
                    sku: "widget".into(),
                    respond_to,
                })
                .await
        });

        match receiver.recv().await {
            Some(StockRequest::Check { sku, respond_to }) => {
                assert_eq!(sku, "widget");
                respond_to.send(Ok(1)).unwrap();
            }
            None => panic!("Expected Check request"),
        }

        assert_eq!(task.await.unwrap(), Ok(Ok(1)));
    }
}
