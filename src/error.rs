use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the datasource registry and the udbc driver layer.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("General error: {0}")]
    General(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Unknown datasource: {0}")]
    UnknownDatasource(String),
    #[error("Failed to create connection source for datasource '{name}'")]
    ConnectionSourceCreationFailed {
        name: String,
        #[source]
        source: BoxError,
    },
    #[error("Work unit failed on datasource '{name}'")]
    WorkUnitFailed {
        name: String,
        #[source]
        source: BoxError,
    },
    #[error("Lifecycle hook '{hook}' failed while tearing down datasource '{name}'")]
    LifecycleTeardown {
        name: String,
        hook: String,
        #[source]
        source: BoxError,
    },
    #[error("Handle count underflow on datasource '{0}': release without matching acquire")]
    HandleCountUnderflow(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Unsupported database type: {0}")]
    UnsupportedDatabaseType(String),
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl DbError {
    /// Wraps a creation-time failure for `name`, leaving an already wrapped
    /// creation failure untouched.
    pub(crate) fn creation_failed(name: &str, err: DbError) -> Self {
        match err {
            e @ DbError::ConnectionSourceCreationFailed { .. } => e,
            other => DbError::ConnectionSourceCreationFailed {
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Wraps the failure of a caller supplied work unit. A bare work unit
    /// failure from a nested call is passed through as is; anything else,
    /// including context attached by the caller, becomes the cause.
    pub(crate) fn work_unit_failed(name: &str, err: anyhow::Error) -> Self {
        let nested = matches!(
            err.chain().next().and_then(|e| e.downcast_ref::<DbError>()),
            Some(DbError::WorkUnitFailed { .. })
        );
        let err = if nested {
            match err.downcast::<DbError>() {
                Ok(e) => return e,
                Err(err) => err,
            }
        } else {
            err
        };
        DbError::WorkUnitFailed {
            name: name.to_string(),
            source: err.into(),
        }
    }
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for DbError {
    fn from(e: mysql_async::Error) -> Self {
        DbError::Database(e.to_string())
    }
}

impl From<quick_xml::DeError> for DbError {
    fn from(e: quick_xml::DeError) -> Self {
        DbError::Config(e.to_string())
    }
}
