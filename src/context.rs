use std::sync::{Arc, OnceLock};

use futures::{executor::ThreadPool, task::Spawn};

use crate::scope::Scope;

/// Where a launched computation runs and which cancellation scope it hangs
/// under. Both parts are optional; missing parts fall back to the shared
/// general-purpose pool and to no parent.
///
/// Contexts are always passed explicitly; there is no ambient "current
/// scope".
#[derive(Default, Clone)]
pub struct ExecutionContext {
  spawner: Option<Arc<dyn Spawn + Send + Sync>>,
  parent: Option<Scope>,
}

impl ExecutionContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_spawner<S>(mut self, spawner: S) -> Self
  where
    S: Spawn + Send + Sync + 'static,
  {
    self.spawner = Some(Arc::new(spawner));
    self
  }

  pub fn with_parent(mut self, parent: Scope) -> Self {
    self.parent = Some(parent);
    self
  }

  pub(crate) fn parent(&self) -> Option<&Scope> {
    self.parent.as_ref()
  }

  pub(crate) fn spawner(&self) -> Arc<dyn Spawn + Send + Sync> {
    self.spawner.clone().unwrap_or_else(shared_pool)
  }
}

fn shared_pool() -> Arc<dyn Spawn + Send + Sync> {
  static POOL: OnceLock<ThreadPool> = OnceLock::new();

  let pool = POOL.get_or_init(|| {
    ThreadPool::builder()
      .name_prefix("listenfut-worker-")
      .create()
      .expect("failed to create the shared thread pool")
  });

  Arc::new(pool.clone())
}

#[cfg(test)]
static_assertions::assert_impl_all!(ExecutionContext: Send, Sync);
