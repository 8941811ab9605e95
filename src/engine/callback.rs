//! engine::callback
//!
//! Single-fire completion sink for a dispatched request.
//!
//! # Invariants
//!
//! - `success` and `failure` consume the callback, so at most one fires
//! - The sink receives the request's metadata back with the outcome
//!
//! Every pipeline path that owns a callback must end by firing it. The
//! commit path enforces this with a drop guard (see
//! [`update`](super::update)).
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use metatx::engine::{Callback, RequestMetadata, Response};
//!
//! let (callback, reply) = Callback::channel();
//! callback.success(RequestMetadata::new(), Response::Empty);
//!
//! let reply = reply.await.unwrap();
//! assert_eq!(reply.result, Ok(Response::Empty));
//! # }
//! ```

use std::fmt;

use serde::Serialize;
use tokio::sync::oneshot;

use super::error::OperationError;
use super::request::{RequestMetadata, Response};

/// Outcome of one request as delivered to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub metadata: RequestMetadata,
    pub result: Result<Response, OperationError>,
}

impl Reply {
    /// True if the request succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Render the reply for the wire.
    pub fn to_wire(&self) -> WireReply<'_> {
        match &self.result {
            Ok(response) => WireReply {
                request_id: self.metadata.request_id.to_string(),
                ok: true,
                response: Some(response),
                error: None,
            },
            Err(err) => WireReply {
                request_id: self.metadata.request_id.to_string(),
                ok: false,
                response: None,
                error: Some(WireError {
                    kind: err.kind(),
                    errno: err.errno().map(|e| e.as_str()),
                    redirect: err.redirect_hint().map(|m| m.as_str()),
                    message: err.to_string(),
                }),
            },
        }
    }
}

/// Serializable view of a [`Reply`].
#[derive(Debug, Serialize)]
pub struct WireReply<'a> {
    pub request_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<&'a Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError<'a>>,
}

/// Serializable view of an [`OperationError`].
#[derive(Debug, Serialize)]
pub struct WireError<'a> {
    pub kind: super::error::ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'a str>,
    pub message: String,
}

type Sink = Box<dyn FnOnce(Reply) + Send + 'static>;

/// Completion sink supplied by the transport.
pub struct Callback {
    sink: Sink,
}

impl Callback {
    /// Wrap a closure.
    pub fn new(sink: impl FnOnce(Reply) + Send + 'static) -> Self {
        Self {
            sink: Box::new(sink),
        }
    }

    /// A callback paired with a receiver for its reply.
    ///
    /// A receiver that is dropped before the reply arrives is ignored.
    pub fn channel() -> (Self, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        let callback = Self::new(move |reply| {
            let _ = tx.send(reply);
        });
        (callback, rx)
    }

    /// Deliver a successful response.
    pub fn success(self, metadata: RequestMetadata, response: Response) {
        self.complete(Reply {
            metadata,
            result: Ok(response),
        });
    }

    /// Deliver a failure.
    pub fn failure(self, metadata: RequestMetadata, error: OperationError) {
        self.complete(Reply {
            metadata,
            result: Err(error),
        });
    }

    /// Deliver a finished reply.
    pub fn complete(self, reply: Reply) {
        (self.sink)(reply);
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}
