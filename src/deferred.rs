//! Handles to already-running computations.

use std::future::Future;

use crate::{
  context::ExecutionContext,
  error::{Cancelled, Cause, GetError},
  launch::spawn_into,
  listenable::{callback, ListenableFuture, Listener},
  scope::Scope,
};

/// A cloneable handle to an already-spawned computation: its eventual result
/// plus the cancellation scope it runs under.
///
/// Unlike [`launch`](crate::launch()), which hands out a listenable future
/// directly, a `Deferred` keeps the coroutine-side surface (join, cancel,
/// completion listeners) and can be adapted into a listenable future later
/// with [`as_listenable`](Self::as_listenable), without starting new work.
pub struct Deferred<T: 'static> {
  result: ListenableFuture<T>,
  scope: Scope,
}

impl<T: 'static> Clone for Deferred<T> {
  fn clone(&self) -> Self {
    Deferred { result: self.result.clone(), scope: self.scope.clone() }
  }
}

impl<T: Send + Sync + 'static> Deferred<T> {
  /// Starts `computation` eagerly under a child scope of `ctx`'s parent.
  pub fn spawn<F>(ctx: ExecutionContext, computation: F) -> Self
  where
    F: Future<Output = Result<T, Cause>> + Send + 'static,
  {
    let scope = Scope::child(ctx.parent());
    // Deliberately unlinked: this handle is cancelled through its scope,
    // not through the result cell's external mutators.
    let result = ListenableFuture::new();

    spawn_into(&ctx, computation, &result, &scope);

    Deferred { result, scope }
  }

  pub fn is_done(&self) -> bool {
    self.result.is_done()
  }

  pub fn scope(&self) -> &Scope {
    &self.scope
  }

  /// Cancels the computation's scope, aborting the computation.
  pub fn cancel(&self, cause: Cancelled) -> bool {
    self.scope.cancel(cause)
  }

  pub fn try_result(&self) -> Option<Result<T, GetError>>
  where
    T: Clone,
  {
    self.result.try_get()
  }

  /// Blocks the calling thread until the computation finishes.
  pub fn result(&self) -> Result<T, GetError>
  where
    T: Clone,
  {
    self.result.get()
  }

  /// Registers a callback pair on the computation's outcome.
  pub fn on_completion(&self, listener: impl Listener<T> + 'static) {
    self.result.add_listener(listener);
  }

  /// Wraps this already-running computation into a [`ListenableFuture`]
  /// without launching anything.
  ///
  /// The returned future completes with the deferred's value, or with the
  /// original failure cause (never a retrieval wrapper). Cancelling the
  /// returned future cancels the deferred's scope; cancelling the deferred
  /// completes the returned future as cancelled.
  pub fn as_listenable(&self) -> ListenableFuture<T>
  where
    T: Clone,
  {
    let future = ListenableFuture::new();
    future.link(&self.scope);

    let on_success = future.clone();
    let on_failure = future.clone();
    self.result.add_listener(callback(
      move |value: &T| {
        on_success.complete_value(value.clone());
      },
      move |error: &GetError| match error {
        GetError::Failed(cause) => {
          on_failure.complete_failed(cause.clone());
        }
        GetError::Cancelled(cancelled) => {
          on_failure.complete_cancelled(cancelled.clone());
        }
      },
    ));

    future
  }
}
