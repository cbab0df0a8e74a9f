//! Launching a computation as a listenable future.

use std::{future::Future, sync::Arc};

use futures::{
  future::{AbortHandle, Abortable},
  task::{FutureObj, Spawn},
};

use crate::{
  context::ExecutionContext,
  error::{Cancelled, Cause},
  listenable::ListenableFuture,
  scope::{Completion, Scope},
};

/// Starts `computation` eagerly under a child scope of `ctx`'s parent and
/// returns a [`ListenableFuture`] tied to its outcome.
///
/// The future completes with the computation's value or original failure
/// cause. Cancelling the future (or force-completing it with a failure)
/// cancels the computation's scope; cancelling the scope, directly or through
/// a parent, aborts the computation and completes the future as cancelled.
pub fn launch<T, F>(
  ctx: ExecutionContext,
  computation: F,
) -> ListenableFuture<T>
where
  F: Future<Output = Result<T, Cause>> + Send + 'static,
  T: Send + Sync + 'static,
{
  let scope = Scope::child(ctx.parent());
  let future = ListenableFuture::new();
  future.link(&scope);

  spawn_into(&ctx, computation, &future, &scope);

  future
}

/// Shared spawn wiring: runs `computation` abortably under `scope`, writing
/// its terminal outcome into `future`.
///
/// `future` is completed exactly once, by whichever of these wins:
/// the computation's own terminal write, or the scope's completion listener
/// reporting an abnormal scope completion.
pub(crate) fn spawn_into<T, F>(
  ctx: &ExecutionContext,
  computation: F,
  future: &ListenableFuture<T>,
  scope: &Scope,
) where
  F: Future<Output = Result<T, Cause>> + Send + 'static,
  T: Send + Sync + 'static,
{
  // Covers cancellation initiated outside the computation, e.g. a parent
  // scope cancelling this one.
  {
    let future = future.clone();
    scope.on_completion(move |completion| {
      if let Completion::Cancelled(cause) = completion {
        future.complete_cancelled(cause.clone());
      }
    });
  }

  let (abort, registration) = AbortHandle::new_pair();
  scope.attach(abort);

  let body = {
    let future = future.clone();
    let scope = scope.clone();
    async move {
      match Abortable::new(computation, registration).await {
        Ok(Ok(value)) => {
          future.complete_value(value);
          scope.complete();
        }
        Ok(Err(cause)) => {
          tracing::trace!("computation failed, completing future with cause");
          future.complete_failed(cause);
          scope.complete();
        }
        // Aborted: the scope cancellation that fired the abort has already
        // completed the future through the completion listener.
        Err(_aborted) => {}
      }
    }
  };

  if let Err(err) = ctx.spawner().spawn_obj(FutureObj::new(Box::new(body))) {
    tracing::warn!(error = %err, "spawner refused the computation");
    future.complete_failed(Arc::new(err));
    scope.cancel(Cancelled::new("spawner refused the computation"));
  }
}
