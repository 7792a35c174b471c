use crate::error::DbError;
use crate::handler::DatasourceHandler;
use tracing::info;

/// Application lifecycle glue: opens datasources flagged
/// `connect_on_startup` and closes every configured one on shutdown.
pub struct DatasourceAddon<'a> {
    handler: &'a DatasourceHandler,
}

impl<'a> DatasourceAddon<'a> {
    pub fn new(handler: &'a DatasourceHandler) -> Self {
        Self { handler }
    }

    /// Returns the names that were connected.
    pub async fn on_startup(&self) -> Result<Vec<String>, DbError> {
        let names: Vec<String> = self
            .handler
            .registry()
            .config()
            .settings()
            .filter(|s| s.connect_on_startup)
            .map(|s| s.name.clone())
            .collect();
        for name in &names {
            info!(datasource = %name, "connecting on startup");
            self.handler
                .with_connection_source(name, |_, _| async { Ok(()) })
                .await?;
        }
        Ok(names)
    }

    pub async fn on_shutdown(&self) -> Result<(), DbError> {
        let names: Vec<String> = self
            .handler
            .registry()
            .config()
            .names()
            .map(str::to_string)
            .collect();
        for name in &names {
            self.handler.close(name).await?;
        }
        Ok(())
    }
}
