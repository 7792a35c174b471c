use crate::config::DatasourceSettings;
use crate::error::DbError;
use crate::udbc::ConnectionOptions;
use crate::udbc::connection::Connection;
use crate::udbc::driver::{Driver, DriverFactory};
use crate::udbc_mysql::connection::MysqlConnection;
use async_trait::async_trait;
use mysql_async::Pool as MySqlPoolInternal;
use mysql_async::{Opts, OptsBuilder, PoolConstraints, PoolOpts};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const MYSQL_TYPE: &str = "mysql";

/// A `mysql_async` pool bound to one datasource name.
pub struct MysqlDriver {
    name: String,
    options: ConnectionOptions,
    pool: MySqlPoolInternal,
}

impl MysqlDriver {
    pub fn new(
        name: impl Into<String>,
        url: &str,
        options: ConnectionOptions,
    ) -> Result<Self, DbError> {
        let opts = Opts::from_url(url).map_err(|e| DbError::InvalidDatabaseUrl(e.to_string()))?;
        let constraints = PoolConstraints::new(
            options.max_idle_conns as usize,
            options.max_open_conns as usize,
        )
        .ok_or_else(|| DbError::Config("Invalid pool constraints: min > max".to_string()))?;

        let mut pool_opts = PoolOpts::default().with_constraints(constraints);
        if options.max_lifetime > 0 {
            pool_opts =
                pool_opts.with_inactive_connection_ttl(Duration::from_secs(options.max_lifetime));
        }

        let builder = OptsBuilder::from_opts(opts).pool_opts(pool_opts);
        Ok(Self {
            name: name.into(),
            options,
            pool: MySqlPoolInternal::new(builder),
        })
    }
}

#[async_trait]
impl Driver for MysqlDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn r#type(&self) -> &str {
        MYSQL_TYPE
    }

    async fn connection(&self) -> Result<Arc<dyn Connection>, DbError> {
        let checkout = self.pool.get_conn();
        let conn = if self.options.timeout > 0 {
            tokio::time::timeout(Duration::from_secs(self.options.timeout), checkout)
                .await
                .map_err(|_| {
                    DbError::Connection(format!(
                        "timed out after {}s waiting for a connection to '{}'",
                        self.options.timeout, self.name
                    ))
                })??
        } else {
            checkout.await?
        };
        Ok(Arc::new(MysqlConnection::new(conn)))
    }

    async fn close(&self) -> Result<(), DbError> {
        self.pool.clone().disconnect().await?;
        Ok(())
    }
}

/// [`DriverFactory`] for `mysql://` datasources.
///
/// Reads `max_open_conns`, `max_idle_conns`, `max_lifetime` (seconds) and
/// `timeout` (seconds) from the datasource options.
#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlDriverFactory;

#[async_trait]
impl DriverFactory for MysqlDriverFactory {
    async fn create(
        &self,
        name: &str,
        settings: &DatasourceSettings,
    ) -> Result<Arc<dyn Driver>, DbError> {
        let scheme = settings.scheme()?;
        if scheme != MYSQL_TYPE {
            return Err(DbError::UnsupportedDatabaseType(scheme.to_string()));
        }
        let options = settings.connection_options()?;
        let driver = MysqlDriver::new(name, &settings.url, options)?;
        // Fail creation early when the server is unreachable.
        driver.connection().await?;
        info!(datasource = name, max_open_conns = options.max_open_conns, "mysql pool ready");
        Ok(Arc::new(driver))
    }
}
