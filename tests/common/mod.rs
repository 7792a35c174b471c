#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uorm_datasource::udbc::connection::{Connection, Row};
use uorm_datasource::udbc::driver::{Driver, DriverFactory};
use uorm_datasource::udbc::value::Value;
use uorm_datasource::{
    ConnectionSource, DatasourceConfig, DatasourceSettings, DbError, LifecycleHook,
};

pub type Events = Arc<Mutex<Vec<String>>>;

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn taken(events: &Events) -> Vec<String> {
    std::mem::take(&mut *events.lock().unwrap())
}

pub fn config(names: &[&str]) -> DatasourceConfig {
    names
        .iter()
        .fold(DatasourceConfig::new().default_name(names[0]), |c, n| {
            c.datasource(DatasourceSettings::new(*n, format!("mock://localhost/{n}")))
        })
}

/// Logs every statement as `c<id>:<sql>` into the owning factory's statement log.
pub struct MockConnection {
    id: usize,
    statements: Events,
}

impl MockConnection {
    fn log(&self, sql: &str) {
        self.statements
            .lock()
            .unwrap()
            .push(format!("c{}:{}", self.id, sql));
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DbError> {
        self.log(sql);
        let mut row = Row::new();
        row.insert("sql".into(), Value::from(sql));
        row.insert("args".into(), Value::from(args.len() as i64));
        Ok(vec![row])
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, DbError> {
        self.log(sql);
        Ok(args.len() as u64)
    }

    async fn last_insert_id(&self) -> Result<u64, DbError> {
        Ok(42)
    }

    async fn begin(&self) -> Result<(), DbError> {
        self.log("BEGIN");
        Ok(())
    }

    async fn commit(&self) -> Result<(), DbError> {
        self.log("COMMIT");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DbError> {
        self.log("ROLLBACK");
        Ok(())
    }
}

pub struct MockDriver {
    name: String,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    next_conn: AtomicUsize,
    statements: Events,
}

impl MockDriver {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn r#type(&self) -> &str {
        "mock"
    }

    async fn connection(&self) -> Result<Arc<dyn Connection>, DbError> {
        if self.is_closed() {
            return Err(DbError::Connection("pool closed".into()));
        }
        Ok(Arc::new(MockConnection {
            id: self.next_conn.fetch_add(1, Ordering::SeqCst) + 1,
            statements: self.statements.clone(),
        }))
    }

    async fn close(&self) -> Result<(), DbError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every create/destroy into the shared event log.
#[derive(Default)]
pub struct MockFactory {
    pub events: Option<Events>,
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub fail_create: AtomicBool,
    pub delay: Option<Duration>,
    pub drivers: Mutex<Vec<Arc<MockDriver>>>,
    pub statements: Events,
}

impl MockFactory {
    pub fn with_events(events: Events) -> Self {
        Self {
            events: Some(events),
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn last_driver(&self) -> Option<Arc<MockDriver>> {
        self.drivers.lock().unwrap().last().cloned()
    }

    pub fn all_drivers(&self) -> Vec<Arc<MockDriver>> {
        self.drivers.lock().unwrap().clone()
    }

    fn log(&self, event: String) {
        if let Some(events) = &self.events {
            events.lock().unwrap().push(event);
        }
    }
}

#[async_trait]
impl DriverFactory for MockFactory {
    async fn create(
        &self,
        name: &str,
        _settings: &DatasourceSettings,
    ) -> Result<Arc<dyn Driver>, DbError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(DbError::Connection(format!("cannot reach {name}")));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        self.log(format!("factory.create:{name}"));
        let driver = Arc::new(MockDriver {
            name: name.to_string(),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            next_conn: AtomicUsize::new(0),
            statements: self.statements.clone(),
        });
        self.drivers.lock().unwrap().push(driver.clone());
        Ok(driver)
    }

    async fn destroy(&self, name: &str, driver: Arc<dyn Driver>) -> Result<(), DbError> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        self.log(format!("factory.destroy:{name}"));
        driver.close().await
    }
}

/// Hook that logs `<label>.on_create:<name>` / `<label>.on_destroy:<name>`.
pub struct RecordingHook {
    pub label: String,
    pub events: Events,
    pub fail_create: bool,
    pub fail_destroy: bool,
    pub destroy_delay: Option<Duration>,
}

impl RecordingHook {
    pub fn new(label: &str, events: &Events) -> Self {
        Self {
            label: label.to_string(),
            events: events.clone(),
            fail_create: false,
            fail_destroy: false,
            destroy_delay: None,
        }
    }

    pub fn slow_destroy(mut self, delay: Duration) -> Self {
        self.destroy_delay = Some(delay);
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }
}

#[async_trait]
impl LifecycleHook for RecordingHook {
    fn name(&self) -> &str {
        &self.label
    }

    async fn on_create(&self, name: &str, _source: &ConnectionSource) -> Result<(), DbError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("{}.on_create:{}", self.label, name));
        if self.fail_create {
            return Err(DbError::General(format!("{} refused", self.label)));
        }
        Ok(())
    }

    async fn on_destroy(&self, name: &str, _source: &ConnectionSource) -> Result<(), DbError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("{}.on_destroy:{}", self.label, name));
        if let Some(delay) = self.destroy_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_destroy {
            return Err(DbError::General(format!("{} teardown failed", self.label)));
        }
        Ok(())
    }
}
