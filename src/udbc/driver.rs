use crate::config::DatasourceSettings;
use crate::error::DbError;
use crate::udbc::connection::Connection;
use async_trait::async_trait;
use std::sync::Arc;

/// A pooled physical data source.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    fn r#type(&self) -> &str;

    async fn connection(&self) -> Result<Arc<dyn Connection>, DbError>;
    async fn close(&self) -> Result<(), DbError>;
}

/// Allocates and releases the physical data source behind a datasource name.
///
/// `create` may block on network I/O; the registry awaits it on the calling
/// task while holding the per-name creation lock.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn create(
        &self,
        name: &str,
        settings: &DatasourceSettings,
    ) -> Result<Arc<dyn Driver>, DbError>;

    /// Releases the physical data source. Errors are reported by the caller
    /// and never propagated past the registry.
    async fn destroy(&self, _name: &str, driver: Arc<dyn Driver>) -> Result<(), DbError> {
        driver.close().await
    }
}
