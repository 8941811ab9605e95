//! engine
//!
//! The mutation pipeline: Dispatch -> Gate -> Validate -> Batch -> Commit -> Post-process -> Reply.
//!
//! # Architecture
//!
//! Every write request follows one lifecycle:
//!
//! 1. **Dispatch**: the [`Dispatcher`] looks up the operation for the
//!    request's procedure id
//! 2. **Gate**: the operation asks the store's [`WriteGate`](gate::WriteGate)
//!    whether this node is the write master
//! 3. **Validate**: path resolution and permission checks, in a fixed order
//! 4. **Batch**: only after every check has passed, the operation builds an
//!    [`AtomicUpdate`] with a bound [`PostProcessor`]
//! 5. **Commit**: the storage engine applies the batch atomically,
//!    re-checking leadership inside its critical section
//! 6. **Post-process**: the post-processor builds the response
//! 7. **Reply**: exactly one [`Callback`] invocation
//!
//! # Invariants
//!
//! - A request that fails steps 2 or 3 leaves no trace in storage
//! - Operations never call the storage engine's `commit` directly
//! - Every dispatched request yields exactly one callback invocation
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use metatx::core::types::{ProcedureId, UserDetails};
//! use metatx::engine::{Callback, DispatcherBuilder, OperationError, RequestMetadata};
//!
//! let dispatcher = DispatcherBuilder::new().build();
//! let (callback, reply) = Callback::channel();
//! dispatcher.dispatch(
//!     ProcedureId::new(99),
//!     serde_json::json!({}),
//!     UserDetails::root(),
//!     RequestMetadata::new(),
//!     callback,
//! );
//! assert!(matches!(
//!     reply.await.unwrap().result,
//!     Err(OperationError::UnknownProcedure(_))
//! ));
//! # }
//! ```

pub mod callback;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod request;
pub mod update;

pub use callback::{Callback, Reply};
pub use dispatch::{DispatchError, Dispatcher, DispatcherBuilder, Operation, Prepared};
pub use error::{ErrorKind, OperationError};
pub use gate::{LeadershipToken, Redirect, WriteGate};
pub use request::{RequestContext, RequestMetadata, Response};
pub use update::{AtomicUpdate, PostProcessor};
