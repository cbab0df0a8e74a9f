use std::{
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
  time::Duration,
};

use listenfut::{callback, Cancelled, Cause, GetError, ListenableFuture};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
struct IllegalState(&'static str);

#[test]
fn set_then_get() {
  let future = ListenableFuture::<u8>::new();

  assert!(!future.is_done());
  assert!(future.set(42));
  assert!(future.is_done());
  assert_eq!(future.get().unwrap(), 42);

  // The value stays in place for other observers.
  assert_eq!(future.clone().get().unwrap(), 42);
}

#[test]
fn completion_is_idempotent() {
  let future = ListenableFuture::<u8>::new();
  let fired = Arc::new(AtomicUsize::new(0));

  let on_success = fired.clone();
  let on_failure = fired.clone();
  future.add_listener(callback(
    move |_: &u8| {
      on_success.fetch_add(1, Ordering::SeqCst);
    },
    move |_: &GetError| {
      on_failure.fetch_add(1, Ordering::SeqCst);
    },
  ));

  assert!(future.set(1));
  assert!(!future.set(2));
  assert!(!future.set_err(Arc::new(IllegalState("late"))));
  assert!(!future.cancel());

  assert_eq!(fired.load(Ordering::SeqCst), 1);
  assert_eq!(future.get().unwrap(), 1);
}

#[test]
fn failure_keeps_its_identity() {
  let future = ListenableFuture::<u8>::new();
  let original: Cause = Arc::new(IllegalState("x"));

  future.set_err(original.clone());

  match future.get() {
    Err(GetError::Failed(observed)) => {
      assert!(Arc::ptr_eq(&original, &observed));
      assert_eq!(observed.to_string(), "x");
    }
    other => panic!("expected a failure, got {other:?}"),
  }
}

#[test]
fn cancelled_future_reports_cancellation() {
  let future = ListenableFuture::<u8>::new();

  future.cancel_with(Cancelled::new("operator stop"));

  assert!(future.is_cancelled());
  match future.get() {
    Err(GetError::Cancelled(cancelled)) => {
      assert_eq!(cancelled.message(), "operator stop");
    }
    other => panic!("expected cancellation, got {other:?}"),
  }
}

#[test]
fn listener_added_after_completion_fires_immediately() {
  let future = ListenableFuture::<u8>::new();
  future.set(9);

  let fired = Arc::new(AtomicUsize::new(0));
  let on_success = fired.clone();
  let on_failure = fired.clone();
  future.add_listener(callback(
    move |value: &u8| {
      assert_eq!(*value, 9);
      on_success.fetch_add(1, Ordering::SeqCst);
    },
    move |_: &GetError| {
      on_failure.fetch_add(1, Ordering::SeqCst);
    },
  ));

  assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn get_blocks_until_completed() {
  let future = ListenableFuture::<u8>::new();

  let completer = {
    let future = future.clone();
    std::thread::spawn(move || {
      std::thread::sleep(Duration::from_millis(50));
      future.set(3);
    })
  };

  assert_eq!(future.get().unwrap(), 3);
  completer.join().unwrap();
}
