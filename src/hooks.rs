//! Callbacks run when a connection source is created or torn down.
//!
//! Hooks let collaborators install their own setup (migrations, monitoring,
//! custom registration) without the registry knowing about them.

use crate::error::DbError;
use crate::source::ConnectionSource;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// A creation/destruction callback for connection sources.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// Hook name for logging and teardown reports.
    fn name(&self) -> &str;

    /// Runs after the physical data source exists and before the source is
    /// handed to any caller. An error aborts the creation.
    async fn on_create(&self, name: &str, source: &ConnectionSource) -> Result<(), DbError>;

    /// Runs before the physical data source is released. An error is
    /// reported and does not stop the teardown.
    async fn on_destroy(&self, name: &str, source: &ConnectionSource) -> Result<(), DbError>;
}

/// Ordered set of [`LifecycleHook`]s. Both phases run in registration order.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, hook: impl LifecycleHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn register_arc(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Stops at the first failing hook.
    pub(crate) async fn run_create(
        &self,
        name: &str,
        source: &ConnectionSource,
    ) -> Result<(), DbError> {
        for hook in &self.hooks {
            debug!(datasource = name, hook = hook.name(), "on_create");
            hook.on_create(name, source).await?;
        }
        Ok(())
    }

    /// Runs every hook and returns the failures as teardown errors.
    pub(crate) async fn run_destroy(&self, name: &str, source: &ConnectionSource) -> Vec<DbError> {
        let mut failures = Vec::new();
        for hook in &self.hooks {
            debug!(datasource = name, hook = hook.name(), "on_destroy");
            if let Err(e) = hook.on_destroy(name, source).await {
                warn!(datasource = name, hook = hook.name(), error = %e, "on_destroy failed");
                failures.push(DbError::LifecycleTeardown {
                    name: name.to_string(),
                    hook: hook.name().to_string(),
                    source: Box::new(e),
                });
            }
        }
        failures
    }
}
