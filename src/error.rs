use std::sync::Arc;

use thiserror::Error;

/// The failure a computation actually produced.
///
/// Every observer of the same future sees the same allocation, so callers
/// comparing failures can rely on [`Arc::ptr_eq`] rather than on string
/// matching.
pub type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// A cancellation, carrying the message of whatever triggered it.
///
/// Only the `Display` output of the triggering error crosses a cancellation
/// link; the source chain stays behind.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Cancelled {
  message: String,
}

impl Cancelled {
  pub fn new(message: impl Into<String>) -> Self {
    Cancelled { message: message.into() }
  }

  pub(crate) fn from_cause(cause: &(dyn std::error::Error + 'static)) -> Self {
    Cancelled { message: cause.to_string() }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

impl Default for Cancelled {
  fn default() -> Self {
    Cancelled { message: "future was cancelled".into() }
  }
}

/// What blocking retrieval returns when a future did not succeed.
///
/// This is a retrieval wrapper, not the failure itself. Code that resumes a
/// suspended computation must strip it with [`GetError::into_cause`] so the
/// original failure keeps its identity.
#[derive(Debug, Clone, Error)]
pub enum GetError {
  #[error("computation failed")]
  Failed(#[source] Cause),
  #[error("future was cancelled")]
  Cancelled(#[source] Cancelled),
}

impl GetError {
  /// Strips the retrieval wrapper, yielding the failure the computation
  /// produced. A cancellation surfaces as the [`Cancelled`] error itself.
  pub fn into_cause(self) -> Cause {
    match self {
      GetError::Failed(cause) => cause,
      GetError::Cancelled(cancelled) => Arc::new(cancelled),
    }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, GetError::Cancelled(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn into_cause_preserves_identity() {
    let original: Cause = Arc::new(Cancelled::new("boom"));
    let unwrapped = GetError::Failed(original.clone()).into_cause();
    assert!(Arc::ptr_eq(&original, &unwrapped));
  }

  #[test]
  fn cancelled_from_cause_takes_message_only() {
    let trigger = Cancelled::new("shutting down");
    let derived = Cancelled::from_cause(&trigger);
    assert_eq!(derived.message(), "shutting down");
  }
}
