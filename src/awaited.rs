//! Awaiting a listenable future from inside a coroutine.

use std::{
  future::{Future, IntoFuture},
  pin::Pin,
  sync::{Arc, Mutex},
  task::{Context, Poll, Waker},
};

use crate::{
  error::{Cancelled, Cause, GetError},
  listenable::{callback, ListenableFuture},
};

struct AwaitShared {
  waker: Mutex<Option<Waker>>,
}

impl AwaitShared {
  fn wake(&self) {
    if let Some(waker) = self.waker.lock().unwrap().take() {
      waker.wake();
    }
  }
}

pin_project_lite::pin_project! {
  /// Suspension point over a [`ListenableFuture`].
  ///
  /// Resolves with the future's value, or with the unwrapped original
  /// failure cause — never the [`GetError`] retrieval wrapper. An already
  /// completed future resolves on the first poll without registering any
  /// listener.
  ///
  /// Dropping an `Awaited` that is suspended (listener registered, not yet
  /// resolved) cancels the awaited future: when the enclosing task is
  /// cancelled, the future it was waiting on goes with it. If the drop races
  /// with the future's natural completion, whichever reached the completion
  /// cell first wins and the other is a no-op.
  pub struct Awaited<T>
  where
    T: 'static,
  {
    future: ListenableFuture<T>,
    shared: Arc<AwaitShared>,
    registered: bool,
    done: bool,
  }

  impl<T> PinnedDrop for Awaited<T>
  where
    T: 'static,
  {
    fn drop(this: Pin<&mut Self>) {
      let this = this.project();
      if *this.registered && !*this.done {
        this.future.cancel_with(Cancelled::new(
          "awaiting computation was cancelled",
        ));
      }
    }
  }
}

impl<T: 'static> Awaited<T> {
  fn new(future: ListenableFuture<T>) -> Self {
    Awaited {
      future,
      shared: Arc::new(AwaitShared { waker: Mutex::new(None) }),
      registered: false,
      done: false,
    }
  }
}

impl<T: Clone + 'static> Future for Awaited<T> {
  type Output = Result<T, Cause>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.project();

    if let Some(result) = this.future.try_get() {
      *this.done = true;
      return Poll::Ready(result.map_err(GetError::into_cause));
    }

    // The waker goes in before the listener so an immediately-firing
    // listener has something to wake.
    *this.shared.waker.lock().unwrap() = Some(cx.waker().clone());

    if !*this.registered {
      *this.registered = true;

      let on_success = this.shared.clone();
      let on_failure = this.shared.clone();
      this.future.add_listener(callback(
        move |_: &T| on_success.wake(),
        move |_: &GetError| on_failure.wake(),
      ));
    }

    // Completion may have won between the peek above and the listener
    // registration; settle it now instead of waiting for the wake.
    if let Some(result) = this.future.try_get() {
      *this.done = true;
      return Poll::Ready(result.map_err(GetError::into_cause));
    }

    Poll::Pending
  }
}

impl<T: 'static> ListenableFuture<T> {
  /// A suspension point yielding this future's value or unwrapped failure
  /// cause. See [`Awaited`].
  pub fn awaited(&self) -> Awaited<T> {
    Awaited::new(self.clone())
  }
}

impl<T: Clone + 'static> IntoFuture for ListenableFuture<T> {
  type Output = Result<T, Cause>;
  type IntoFuture = Awaited<T>;

  fn into_future(self) -> Awaited<T> {
    Awaited::new(self)
  }
}
