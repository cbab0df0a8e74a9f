//! Bridge between async computations and callback-driven, cancellable
//! listenable futures.
//!
//! Code written against either abstraction interoperates losslessly:
//!
//! - [`launch()`] runs a computation on an executor and observes it as a
//!   [`ListenableFuture`];
//! - [`Deferred::as_listenable`] wraps an already-running computation into a
//!   [`ListenableFuture`] without starting new work;
//! - [`ListenableFuture::awaited`] (or plain `.await`, via `IntoFuture`)
//!   consumes a listenable future from inside any async block without
//!   blocking a thread.
//!
//! Cancellation and failure propagate in both directions: cancelling a
//! future cancels the [`Scope`] producing it, and dropping a suspended
//! awaiter cancels the future it was waiting on. Failure causes keep their
//! identity end to end — observers see the original error `Arc`, never a
//! wrapper.
//!
//! ```rust
//! use listenfut::{launch, ExecutionContext};
//!
//! let future = launch(ExecutionContext::new(), async { Ok(42u8) });
//! assert_eq!(future.get().unwrap(), 42);
//! ```

mod awaited;
mod cell;
mod context;
mod deferred;
mod launch;
mod listenable;
pub mod error;
pub mod scope;

pub use awaited::Awaited;
pub use context::ExecutionContext;
pub use deferred::Deferred;
pub use error::{Cancelled, Cause, GetError};
pub use launch::launch;
pub use listenable::{callback, ListenableFuture, Listener};
pub use scope::{Completion, Scope};
