//! Cancellation scopes.
//!
//! A [`Scope`] is a node in a cancellation tree. Cancelling a node aborts the
//! work attached to it and cancels every live descendant; completing a node
//! (normally or not) detaches it from its parent's bookkeeping. Completion is
//! terminal and is reported to listeners exactly once.

use std::{
  mem,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, OnceLock, Weak,
  },
};

use dashmap::DashMap;
use futures::future::AbortHandle;

use crate::error::Cancelled;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(0);

/// How a scope ended.
#[derive(Debug, Clone)]
pub enum Completion {
  /// The associated work ran to its end, successfully or not.
  Finished,
  /// The scope was cancelled before its work finished.
  Cancelled(Cancelled),
}

/// A node in a cancellation tree. Cloning yields another handle to the same
/// node.
#[derive(Clone)]
pub struct Scope {
  inner: Arc<Inner>,
}

struct Inner {
  id: u64,
  parent: Weak<Inner>,
  children: DashMap<u64, Scope>,
  done: OnceLock<Completion>,
  listeners: Mutex<Vec<Box<dyn FnOnce(&Completion) + Send>>>,
  aborts: Mutex<Vec<AbortHandle>>,
}

impl Scope {
  /// A scope with no parent.
  pub fn root() -> Self {
    Self::new(Weak::new())
  }

  /// A new scope, registered as a child of `parent` when one is given.
  ///
  /// A child created under an already-cancelled parent is itself cancelled
  /// immediately, with the parent's cause.
  pub fn child(parent: Option<&Scope>) -> Self {
    let Some(parent) = parent else {
      return Self::root();
    };

    let scope = Self::new(Arc::downgrade(&parent.inner));
    parent.inner.children.insert(scope.inner.id, scope.clone());

    // Re-check after registering: a cancellation cascade that ran before the
    // insert cannot have seen this child.
    if let Some(cause) = parent.cancellation_cause() {
      scope.cancel(cause);
    }

    scope
  }

  fn new(parent: Weak<Inner>) -> Self {
    Scope {
      inner: Arc::new(Inner {
        id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
        parent,
        children: DashMap::new(),
        done: OnceLock::new(),
        listeners: Mutex::new(Vec::new()),
        aborts: Mutex::new(Vec::new()),
      }),
    }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self.inner.done.get(), Some(Completion::Cancelled(_)))
  }

  pub fn is_complete(&self) -> bool {
    self.inner.done.get().is_some()
  }

  pub fn cancellation_cause(&self) -> Option<Cancelled> {
    match self.inner.done.get() {
      Some(Completion::Cancelled(cause)) => Some(cause.clone()),
      _ => None,
    }
  }

  /// Cancels this scope and every live descendant. Returns whether this call
  /// was the one that terminated the scope.
  pub fn cancel(&self, cause: Cancelled) -> bool {
    if self.inner.done.set(Completion::Cancelled(cause.clone())).is_err() {
      return false;
    }
    tracing::trace!(scope = self.inner.id, %cause, "scope cancelled");

    for handle in mem::take(&mut *self.inner.aborts.lock().unwrap()) {
      handle.abort();
    }

    // Collect before cancelling: a child detaches itself from our map when
    // it terminates, and removal during iteration would contend on the same
    // shard.
    let children: Vec<Scope> =
      self.inner.children.iter().map(|entry| entry.value().clone()).collect();
    self.inner.children.clear();
    for child in children {
      child.cancel(cause.clone());
    }

    self.fire_listeners();
    self.detach();
    true
  }

  /// Marks the scope's work as finished. Children are left untouched; the
  /// scope only detaches from its parent's bookkeeping.
  pub fn complete(&self) -> bool {
    if self.inner.done.set(Completion::Finished).is_err() {
      return false;
    }
    tracing::trace!(scope = self.inner.id, "scope finished");

    self.fire_listeners();
    self.detach();
    true
  }

  /// Registers a completion listener; fires immediately if the scope is
  /// already terminal. Each listener runs exactly once.
  pub fn on_completion<F>(&self, listener: F)
  where
    F: FnOnce(&Completion) + Send + 'static,
  {
    {
      let mut guard = self.inner.listeners.lock().unwrap();
      if self.inner.done.get().is_none() {
        guard.push(Box::new(listener));
        return;
      }
    }

    let completion =
      self.inner.done.get().expect("checked terminal under the lock");
    listener(completion);
  }

  /// Attaches work to abort when the scope is cancelled. Aborts immediately
  /// if the scope is already cancelled.
  pub fn attach(&self, handle: AbortHandle) {
    {
      let mut guard = self.inner.aborts.lock().unwrap();
      if !self.is_cancelled() {
        guard.push(handle);
        return;
      }
    }
    handle.abort();
  }

  fn fire_listeners(&self) {
    let drained = mem::take(&mut *self.inner.listeners.lock().unwrap());
    let completion =
      self.inner.done.get().expect("terminal before listeners fire");
    for listener in drained {
      listener(completion);
    }
  }

  fn detach(&self) {
    if let Some(parent) = self.inner.parent.upgrade() {
      parent.children.remove(&self.inner.id);
    }
  }

  #[cfg(test)]
  pub(crate) fn live_children(&self) -> usize {
    self.inner.children.len()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use super::*;

  #[test]
  fn cancel_cascades_to_descendants() {
    let root = Scope::root();
    let child = Scope::child(Some(&root));
    let grandchild = Scope::child(Some(&child));

    assert!(root.cancel(Cancelled::new("stop")));

    assert!(child.is_cancelled());
    assert!(grandchild.is_cancelled());
    assert_eq!(grandchild.cancellation_cause().unwrap().message(), "stop");
  }

  #[test]
  fn cancel_is_terminal_and_idempotent() {
    let scope = Scope::root();

    assert!(scope.cancel(Cancelled::new("first")));
    assert!(!scope.cancel(Cancelled::new("second")));
    assert!(!scope.complete());

    assert_eq!(scope.cancellation_cause().unwrap().message(), "first");
  }

  #[test]
  fn child_of_cancelled_parent_starts_cancelled() {
    let root = Scope::root();
    root.cancel(Cancelled::new("gone"));

    let child = Scope::child(Some(&root));
    assert!(child.is_cancelled());
  }

  #[test]
  fn completion_detaches_from_parent() {
    let root = Scope::root();
    let child = Scope::child(Some(&root));
    assert_eq!(root.live_children(), 1);

    child.complete();
    assert_eq!(root.live_children(), 0);
  }

  #[test]
  fn listener_fires_exactly_once() {
    let scope = Scope::root();
    let fired = Arc::new(AtomicUsize::new(0));

    let counter = fired.clone();
    scope.on_completion(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    scope.cancel(Cancelled::default());
    scope.cancel(Cancelled::default());
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let late = fired.clone();
    scope.on_completion(move |completion| {
      assert!(matches!(completion, Completion::Cancelled(_)));
      late.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fired.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn attach_after_cancel_aborts_immediately() {
    let scope = Scope::root();
    scope.cancel(Cancelled::default());

    let (handle, registration) = AbortHandle::new_pair();
    scope.attach(handle);

    let aborted = futures::executor::block_on(
      futures::future::Abortable::new(async { 1 }, registration),
    );
    assert!(aborted.is_err());
  }
}
