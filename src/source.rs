use crate::config::DatasourceSettings;
use crate::error::DbError;
use crate::tracker::HandleTracker;
use crate::udbc::connection::{Connection, Row};
use crate::udbc::driver::Driver;
use crate::udbc::value::Value;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::debug;

/// The long-lived pooled source for one datasource name.
///
/// Only the [`SourceRegistry`](crate::registry::SourceRegistry) creates and
/// tears these down; callers receive them as `Arc<ConnectionSource>`.
pub struct ConnectionSource {
    name: String,
    settings: DatasourceSettings,
    driver: Arc<dyn Driver>,
    tracker: Arc<HandleTracker>,
    monitor_ids: Mutex<Vec<String>>,
    created_at: DateTime<Utc>,
}

impl std::fmt::Debug for ConnectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSource")
            .field("name", &self.name)
            .field("type", &self.driver.r#type())
            .field("handle_count", &self.tracker.current())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl ConnectionSource {
    pub(crate) fn new(settings: DatasourceSettings, driver: Arc<dyn Driver>) -> Self {
        Self {
            name: settings.name.clone(),
            tracker: Arc::new(HandleTracker::new(settings.name.clone())),
            settings,
            driver,
            monitor_ids: Mutex::new(Vec::new()),
            created_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &DatasourceSettings {
        &self.settings
    }

    /// The physical data source. Use it directly for anything beyond the
    /// handle operations offered here.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn tracker(&self) -> &Arc<HandleTracker> {
        &self.tracker
    }

    pub fn handle_count(&self) -> u64 {
        self.tracker.current()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Checks out one connection from the pool.
    pub async fn open(&self) -> Result<Handle, DbError> {
        let conn = self.driver.connection().await?;
        let count = self.tracker.acquire();
        debug!(datasource = %self.name, handle_count = count, "handle opened");
        Ok(Handle {
            name: self.name.clone(),
            conn,
            tracker: self.tracker.clone(),
            closed: AtomicBool::new(false),
        })
    }

    /// Runs one statement on a short-lived handle.
    pub async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, DbError> {
        let handle = self.open().await?;
        let result = handle.execute(sql, args).await;
        handle.close();
        result
    }

    /// Runs one query on a short-lived handle.
    pub async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DbError> {
        let handle = self.open().await?;
        let result = handle.query(sql, args).await;
        handle.close();
        result
    }

    /// Records a monitoring identifier to release on teardown. Duplicates are ignored.
    pub fn add_monitor_id(&self, id: impl Into<String>) -> Result<(), DbError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DbError::InvalidArgument("monitor id must not be blank".into()));
        }
        let mut ids = self.monitor_ids.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.contains(&id) {
            ids.push(id);
        }
        Ok(())
    }

    /// Monitoring identifiers in registration order.
    pub fn monitor_ids(&self) -> Vec<String> {
        self.monitor_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn take_monitor_ids(&self) -> Vec<String> {
        std::mem::take(&mut *self.monitor_ids.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// One checked-out connection.
///
/// Closing (explicitly or by drop) releases the owning source's handle count
/// exactly once.
pub struct Handle {
    name: String,
    conn: Arc<dyn Connection>,
    tracker: Arc<HandleTracker>,
    closed: AtomicBool,
}

impl Handle {
    pub fn datasource(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns `true` on the call that actually closed the handle.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Ok(count) = self.tracker.release() {
            debug!(datasource = %self.name, handle_count = count, "handle closed");
        }
        true
    }

    fn conn(&self) -> Result<&Arc<dyn Connection>, DbError> {
        if self.is_closed() {
            return Err(DbError::Connection(format!(
                "handle on datasource '{}' is closed",
                self.name
            )));
        }
        Ok(&self.conn)
    }

    pub async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, DbError> {
        let conn = self.conn()?;
        let start = Instant::now();
        let result = conn.execute(sql, args).await;
        let elapsed_ms = start.elapsed().as_millis();
        let affected = result.as_ref().ok().copied();
        let err = result.as_ref().err().map(|e| e.to_string());
        debug!("execute: datasource={}, sql={}, params={:?}, elapsed_ms={}, affected={:?}, error={:?}", self.name, sql, args, elapsed_ms, affected, err);
        result
    }

    pub async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DbError> {
        let conn = self.conn()?;
        let start = Instant::now();
        let rows = conn.query(sql, args).await?;
        let elapsed_ms = start.elapsed().as_millis();
        debug!("query: datasource={}, sql={}, params={:?}, elapsed_ms={}, rows={}", self.name, sql, args, elapsed_ms, rows.len());
        Ok(rows)
    }

    pub async fn last_insert_id(&self) -> Result<u64, DbError> {
        self.conn()?.last_insert_id().await
    }

    /// Starts a transaction that owns this handle. The connection is not
    /// reachable outside the transaction until it commits or rolls back.
    pub async fn begin(self) -> Result<Transaction, DbError> {
        self.conn()?.begin().await?;
        Ok(Transaction { handle: Some(self) })
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.close();
    }
}

/// A transaction on its own checked-out connection. Rolled back on drop
/// unless committed.
pub struct Transaction {
    handle: Option<Handle>,
}

impl Transaction {
    fn handle(&self) -> Result<&Handle, DbError> {
        self.handle
            .as_ref()
            .ok_or_else(|| DbError::Connection("transaction already finished".into()))
    }

    fn finish(&mut self) -> Result<Handle, DbError> {
        self.handle
            .take()
            .ok_or_else(|| DbError::Connection("transaction already finished".into()))
    }

    pub async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, DbError> {
        self.handle()?.execute(sql, args).await
    }

    pub async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DbError> {
        self.handle()?.query(sql, args).await
    }

    pub async fn last_insert_id(&self) -> Result<u64, DbError> {
        self.handle()?.last_insert_id().await
    }

    /// Commits and hands the connection back for autocommit use.
    pub async fn commit(mut self) -> Result<Handle, DbError> {
        self.handle()?.conn()?.commit().await?;
        self.finish()
    }

    pub async fn rollback(mut self) -> Result<Handle, DbError> {
        self.handle()?.conn()?.rollback().await?;
        self.finish()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.is_closed() {
            return;
        }
        let conn = handle.conn.clone();
        let name = handle.name.clone();
        // The handle count drops with `handle`; the pooled connection is only
        // returned once the spawned rollback releases `conn`.
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(async move {
                if let Err(e) = conn.rollback().await {
                    debug!(datasource = %name, error = %e, "rollback on drop failed");
                }
            });
        }
    }
}
