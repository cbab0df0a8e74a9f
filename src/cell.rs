use std::{
  mem,
  sync::{Mutex, OnceLock},
};

use crate::{
  error::{Cancelled, Cause, GetError},
  listenable::Listener,
};

/// Terminal state of a completion cell.
pub(crate) enum Outcome<T> {
  Value(T),
  Failed(Cause),
  Cancelled(Cancelled),
}

/// A single-assignment cell shared between one producer, at most one external
/// canceller and any number of listeners.
///
/// The pending → terminal transition happens at most once; the first
/// `complete` wins and every later attempt is a silent no-op. Listeners fire
/// exactly once each, on the completing thread if registered before
/// completion, or on the registering thread if the cell is already terminal.
pub(crate) struct CompletionCell<T: 'static> {
  slot: OnceLock<Outcome<T>>,
  listeners: Mutex<Vec<Box<dyn Listener<T>>>>,
}

impl<T: 'static> CompletionCell<T> {
  pub(crate) fn new() -> Self {
    CompletionCell {
      slot: OnceLock::new(),
      listeners: Mutex::new(Vec::new()),
    }
  }

  pub(crate) fn is_done(&self) -> bool {
    self.slot.get().is_some()
  }

  pub(crate) fn is_cancelled(&self) -> bool {
    matches!(self.slot.get(), Some(Outcome::Cancelled(_)))
  }

  /// Attempts the pending → terminal transition. Returns whether this call
  /// was the one that completed the cell.
  pub(crate) fn complete(&self, outcome: Outcome<T>) -> bool {
    if self.slot.set(outcome).is_err() {
      tracing::debug!("completion attempt ignored, cell already terminal");
      return false;
    }

    let drained = mem::take(&mut *self.listeners.lock().unwrap());

    let outcome =
      self.slot.get().expect("cell terminal after winning the transition");
    for listener in drained {
      dispatch(listener, outcome);
    }

    true
  }

  /// Registers a listener. Fires immediately (on this thread) if the cell is
  /// already terminal.
  ///
  /// The slot check happens under the listener lock so a racing `complete`
  /// either drains this listener or leaves it for us to fire; never both,
  /// never neither.
  pub(crate) fn add_listener(&self, listener: Box<dyn Listener<T>>) {
    {
      let mut guard = self.listeners.lock().unwrap();
      if self.slot.get().is_none() {
        guard.push(listener);
        return;
      }
    }

    let outcome = self.slot.get().expect("checked terminal under the lock");
    dispatch(listener, outcome);
  }

  pub(crate) fn try_result(&self) -> Option<Result<T, GetError>>
  where
    T: Clone,
  {
    self.slot.get().map(|outcome| match outcome {
      Outcome::Value(value) => Ok(value.clone()),
      Outcome::Failed(cause) => Err(GetError::Failed(cause.clone())),
      Outcome::Cancelled(cancelled) => {
        Err(GetError::Cancelled(cancelled.clone()))
      }
    })
  }

  /// Parks the calling thread until the cell is terminal.
  pub(crate) fn wait(&self) {
    if self.is_done() {
      return;
    }

    let (parker, unparker) = parking::pair();
    let on_failure_unparker = unparker.clone();
    self.add_listener(Box::new(crate::listenable::callback(
      move |_: &T| {
        unparker.unpark();
      },
      move |_: &GetError| {
        on_failure_unparker.unpark();
      },
    )));

    while !self.is_done() {
      parker.park();
    }
  }

  #[cfg(test)]
  pub(crate) fn listener_count(&self) -> usize {
    self.listeners.lock().unwrap().len()
  }
}

fn dispatch<T: 'static>(listener: Box<dyn Listener<T>>, outcome: &Outcome<T>) {
  match outcome {
    Outcome::Value(value) => listener.on_success(value),
    Outcome::Failed(cause) => {
      listener.on_failure(&GetError::Failed(cause.clone()))
    }
    Outcome::Cancelled(cancelled) => {
      listener.on_failure(&GetError::Cancelled(cancelled.clone()))
    }
  }
}
