use crate::error::DbError;
use crate::registry::{SourceRegistry, require_name};
use crate::source::ConnectionSource;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Entry point for running work against named datasources.
///
/// Pass it (or an `Arc` of it) to whatever needs database access.
pub struct DatasourceHandler {
    registry: Arc<SourceRegistry>,
}

impl DatasourceHandler {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Name used by the `*_default` shortcuts, taken from configuration.
    pub fn default_name(&self) -> &str {
        self.registry.config().get_default_name()
    }

    /// Runs `work` against the source for `name`, creating it if needed.
    ///
    /// A failure inside `work` is returned as [`DbError::WorkUnitFailed`];
    /// the source stays cached.
    pub async fn with_connection_source<R, F, Fut>(&self, name: &str, work: F) -> Result<R, DbError>
    where
        F: FnOnce(String, Arc<ConnectionSource>) -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        require_name(name)?;
        let source = self.registry.get_or_create(name).await?;
        debug!("Executing statements on datasource '{}'", name);
        work(name.to_string(), source)
            .await
            .map_err(|e| DbError::work_unit_failed(name, e))
    }

    pub async fn with_default_source<R, F, Fut>(&self, work: F) -> Result<R, DbError>
    where
        F: FnOnce(String, Arc<ConnectionSource>) -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        let name = self.default_name().to_string();
        self.with_connection_source(&name, work).await
    }

    /// Tears down the source for `name`; a no-op when none is cached.
    pub async fn close(&self, name: &str) -> Result<(), DbError> {
        self.registry.remove(name).await.map(|_| ())
    }

    pub async fn close_default(&self) -> Result<(), DbError> {
        let name = self.default_name().to_string();
        self.close(&name).await
    }

    /// Tears down every cached source.
    pub async fn close_all(&self) -> usize {
        self.registry.remove_all().await
    }
}
