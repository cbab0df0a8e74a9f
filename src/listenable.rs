//! The externally observable future handle.
//!
//! A [`ListenableFuture`] is a cloneable handle over a single-assignment
//! completion cell. It can be polled for doneness, blocked on, observed
//! through success/failure callbacks, and completed from the outside
//! (`set`, `set_err`, `cancel`) exactly once.
//!
//! A handle may be linked to a cancellation [`Scope`]: external cancellation
//! or failure-completion of the handle cancels the scope, while success never
//! propagates. Writes coming from the adapter wiring itself use the
//! crate-internal mutators and never propagate back, which keeps the
//! scope ⇄ future link free of cancellation cycles.

use std::sync::{Arc, OnceLock};

use crate::{
  cell::{CompletionCell, Outcome},
  error::{Cancelled, Cause, GetError},
  scope::Scope,
};

/// A success/failure callback pair. Exactly one of the two operations runs,
/// exactly once, when the observed future reaches its terminal state.
pub trait Listener<T>: Send {
  fn on_success(self: Box<Self>, value: &T);
  fn on_failure(self: Box<Self>, error: &GetError);
}

struct CallbackPair<S, F> {
  on_success: S,
  on_failure: F,
}

impl<T, S, F> Listener<T> for CallbackPair<S, F>
where
  S: FnOnce(&T) + Send,
  F: FnOnce(&GetError) + Send,
{
  fn on_success(self: Box<Self>, value: &T) {
    (self.on_success)(value)
  }

  fn on_failure(self: Box<Self>, error: &GetError) {
    (self.on_failure)(error)
  }
}

/// Builds a [`Listener`] from two closures.
pub fn callback<T, S, F>(on_success: S, on_failure: F) -> impl Listener<T>
where
  S: FnOnce(&T) + Send + 'static,
  F: FnOnce(&GetError) + Send + 'static,
{
  CallbackPair { on_success, on_failure }
}

/// A future that becomes available asynchronously, observable via polling,
/// blocking retrieval or callback registration, and completable from the
/// outside exactly once.
pub struct ListenableFuture<T: 'static> {
  shared: Arc<Shared<T>>,
}

struct Shared<T: 'static> {
  cell: Arc<CompletionCell<T>>,
  linked: OnceLock<Scope>,
}

impl<T: 'static> Clone for ListenableFuture<T> {
  fn clone(&self) -> Self {
    ListenableFuture { shared: self.shared.clone() }
  }
}

impl<T: 'static> Default for ListenableFuture<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: 'static> ListenableFuture<T> {
  /// A pending, unlinked future, completable via [`set`](Self::set),
  /// [`set_err`](Self::set_err) or [`cancel`](Self::cancel).
  pub fn new() -> Self {
    ListenableFuture {
      shared: Arc::new(Shared {
        cell: Arc::new(CompletionCell::new()),
        linked: OnceLock::new(),
      }),
    }
  }

  pub fn is_done(&self) -> bool {
    self.shared.cell.is_done()
  }

  pub fn is_cancelled(&self) -> bool {
    self.shared.cell.is_cancelled()
  }

  /// Non-blocking peek at the terminal state.
  pub fn try_get(&self) -> Option<Result<T, GetError>>
  where
    T: Clone,
  {
    self.shared.cell.try_result()
  }

  /// Blocks the calling thread until the future is done, then returns its
  /// result. Failures come wrapped in [`GetError`]; the value itself stays
  /// in place for other observers.
  pub fn get(&self) -> Result<T, GetError>
  where
    T: Clone,
  {
    self.shared.cell.wait();
    self.shared.cell.try_result().expect("cell terminal after wait")
  }

  /// Registers a callback pair. Fires immediately on the calling thread if
  /// the future is already done.
  pub fn add_listener(&self, listener: impl Listener<T> + 'static) {
    self.shared.cell.add_listener(Box::new(listener));
  }

  /// Completes the future with a value. Success is never propagated to a
  /// linked scope. Returns false if the future was already done.
  pub fn set(&self, value: T) -> bool {
    self.shared.cell.complete(Outcome::Value(value))
  }

  /// Completes the future with a failure. If this call wins and the future
  /// is linked to a scope, the scope is cancelled with a cause derived from
  /// the failure's message.
  pub fn set_err(&self, cause: Cause) -> bool {
    let won = self.shared.cell.complete(Outcome::Failed(cause.clone()));
    if won {
      self.cancel_linked(Cancelled::from_cause(cause.as_ref()));
    }
    won
  }

  /// Cancels the future. A linked scope is cancelled along with it.
  pub fn cancel(&self) -> bool {
    self.cancel_with(Cancelled::default())
  }

  pub fn cancel_with(&self, cause: Cancelled) -> bool {
    let won = self.shared.cell.complete(Outcome::Cancelled(cause.clone()));
    if won {
      self.cancel_linked(cause);
    }
    won
  }

  fn cancel_linked(&self, cause: Cancelled) {
    if let Some(scope) = self.shared.linked.get() {
      scope.cancel(cause);
    }
  }

  /// Links this future to a scope. At most one scope can be linked; a
  /// second link is ignored.
  pub(crate) fn link(&self, scope: &Scope) {
    if self.shared.linked.set(scope.clone()).is_err() {
      tracing::debug!("future already linked to a scope, ignoring");
    }
  }

  // Adapter-side writes. These never propagate to the linked scope; the
  // scope is the party reporting, so cancelling it back would loop.

  pub(crate) fn complete_value(&self, value: T) -> bool {
    self.shared.cell.complete(Outcome::Value(value))
  }

  pub(crate) fn complete_failed(&self, cause: Cause) -> bool {
    self.shared.cell.complete(Outcome::Failed(cause))
  }

  pub(crate) fn complete_cancelled(&self, cancelled: Cancelled) -> bool {
    self.shared.cell.complete(Outcome::Cancelled(cancelled))
  }

  #[cfg(test)]
  pub(crate) fn listener_count(&self) -> usize {
    self.shared.cell.listener_count()
  }
}

#[cfg(test)]
static_assertions::assert_impl_all!(ListenableFuture<u8>: Send, Sync);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unlinked_cancel_is_standalone() {
    let future = ListenableFuture::<u8>::new();
    assert!(future.cancel());
    assert!(future.is_cancelled());
    assert!(!future.set(1));
  }

  #[test]
  fn set_err_cancels_linked_scope_with_message() {
    let future = ListenableFuture::<u8>::new();
    let scope = Scope::root();
    future.link(&scope);

    future.set_err(Arc::new(Cancelled::new("disk on fire")));

    assert!(scope.is_cancelled());
    assert_eq!(scope.cancellation_cause().unwrap().message(), "disk on fire");
  }

  #[test]
  fn success_does_not_touch_linked_scope() {
    let future = ListenableFuture::<u8>::new();
    let scope = Scope::root();
    future.link(&scope);

    future.set(3);

    assert!(!scope.is_complete());
  }

  #[test]
  fn internal_writes_do_not_propagate() {
    let future = ListenableFuture::<u8>::new();
    let scope = Scope::root();
    future.link(&scope);

    future.complete_cancelled(Cancelled::new("from the scope side"));

    assert!(future.is_cancelled());
    assert!(!scope.is_cancelled());
  }
}
