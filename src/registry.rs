use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{DatasourceConfig, DatasourceSettings};
use crate::error::DbError;
use crate::hooks::LifecycleHooks;
use crate::monitor::MonitoringSink;
use crate::source::ConnectionSource;
use crate::udbc::driver::DriverFactory;

pub(crate) fn require_name(name: &str) -> Result<(), DbError> {
    if name.trim().is_empty() {
        return Err(DbError::InvalidArgument(
            "Argument 'datasource name' must not be blank".into(),
        ));
    }
    Ok(())
}

#[derive(Default)]
struct SlotState {
    source: Option<Arc<ConnectionSource>>,
    closing: bool,
}

/// Per-name cell. `lock` serializes creation and teardown of that name;
/// `state` answers lookups without waiting on it.
#[derive(Default)]
struct Slot {
    lock: Mutex<()>,
    state: RwLock<SlotState>,
}

impl Slot {
    fn read<R>(&self, f: impl FnOnce(&SlotState) -> R) -> R {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<R>(&self, f: impl FnOnce(&mut SlotState) -> R) -> R {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }

    fn ready(&self) -> Option<Arc<ConnectionSource>> {
        self.read(|s| if s.closing { None } else { s.source.clone() })
    }
}

/// Holds at most one [`ConnectionSource`] per datasource name.
///
/// Sources are created on first request through the [`DriverFactory`] and
/// stay cached until [`remove`](Self::remove). Lifecycle hooks must not call
/// back into the registry for the name they are invoked for.
pub struct SourceRegistry {
    config: DatasourceConfig,
    factory: Arc<dyn DriverFactory>,
    hooks: LifecycleHooks,
    monitor: Option<Arc<dyn MonitoringSink>>,
    slots: DashMap<String, Arc<Slot>>,
}

impl SourceRegistry {
    pub fn new(config: DatasourceConfig, factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            config,
            factory,
            hooks: LifecycleHooks::new(),
            monitor: None,
            slots: DashMap::new(),
        }
    }

    pub fn hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Sink that receives the handle counters of datasources with `monitoring` enabled.
    pub fn monitor(mut self, sink: Arc<dyn MonitoringSink>) -> Self {
        self.monitor = Some(sink);
        self
    }

    pub fn config(&self) -> &DatasourceConfig {
        &self.config
    }

    /// Cached source for `name`, without creating one.
    pub fn get(&self, name: &str) -> Option<Arc<ConnectionSource>> {
        self.slots
            .get(name)
            .and_then(|slot| slot.read(|s| s.source.clone()))
    }

    /// Returns the cached source for `name`, creating it on first use.
    ///
    /// Concurrent callers for the same name observe a single creation and
    /// receive the same instance.
    pub async fn get_or_create(&self, name: &str) -> Result<Arc<ConnectionSource>, DbError> {
        require_name(name)?;
        let settings = self
            .config
            .get(name)
            .ok_or_else(|| DbError::UnknownDatasource(name.to_string()))?;

        loop {
            let slot = self.slots.entry(name.to_string()).or_default().clone();
            if let Some(source) = slot.ready() {
                return Ok(source);
            }

            let _guard = slot.lock.lock().await;
            // The slot may have been evicted while we waited.
            if !self.is_current(name, &slot) {
                continue;
            }
            if let Some(source) = slot.ready() {
                debug!(datasource = name, "connection source created by a concurrent caller");
                return Ok(source);
            }

            return match self.create(name, settings.clone()).await {
                Ok(source) => {
                    slot.write(|s| s.source = Some(source.clone()));
                    Ok(source)
                }
                Err(e) => {
                    self.slots.remove_if(name, |_, s| Arc::ptr_eq(s, &slot));
                    Err(e)
                }
            };
        }
    }

    /// Tears down and evicts the source for `name`. Returns `false` when
    /// nothing was cached.
    pub async fn remove(&self, name: &str) -> Result<bool, DbError> {
        require_name(name)?;
        let Some(slot) = self.slots.get(name).map(|s| s.value().clone()) else {
            return Ok(false);
        };

        let _guard = slot.lock.lock().await;
        let Some(source) = slot.write(|s| {
            s.closing = s.source.is_some();
            s.source.clone()
        }) else {
            return Ok(false);
        };

        self.teardown(name, &source).await;

        slot.write(|s| *s = SlotState::default());
        self.slots.remove_if(name, |_, s| Arc::ptr_eq(s, &slot));
        Ok(true)
    }

    /// Removes every cached source and returns how many were torn down.
    /// Creations still in flight are awaited and then torn down as well.
    pub async fn remove_all(&self) -> usize {
        let keys: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        let mut closed = 0;
        for name in keys {
            if let Ok(true) = self.remove(&name).await {
                closed += 1;
            }
        }
        closed
    }

    /// Names with a live cached source, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .iter()
            .filter(|e| e.value().read(|s| s.source.is_some()))
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_current(&self, name: &str, slot: &Arc<Slot>) -> bool {
        self.slots
            .get(name)
            .is_some_and(|s| Arc::ptr_eq(s.value(), slot))
    }

    async fn create(
        &self,
        name: &str,
        settings: DatasourceSettings,
    ) -> Result<Arc<ConnectionSource>, DbError> {
        info!(datasource = name, url_scheme = settings.scheme().unwrap_or("?"), "connect start");
        let driver = self
            .factory
            .create(name, &settings)
            .await
            .map_err(|e| DbError::creation_failed(name, e))?;
        let source = Arc::new(ConnectionSource::new(settings, driver));

        if let Err(e) = self.attach(name, &source).await {
            self.release(name, &source).await;
            return Err(DbError::creation_failed(name, e));
        }

        info!(datasource = name, "connect end");
        Ok(source)
    }

    async fn attach(&self, name: &str, source: &ConnectionSource) -> Result<(), DbError> {
        if source.settings().monitoring {
            if let Some(sink) = &self.monitor {
                let id = sink.register(name, source.tracker().clone())?;
                if let Err(e) = source.add_monitor_id(id.clone()) {
                    sink.unregister(&id);
                    return Err(e);
                }
            }
        }
        self.hooks.run_create(name, source).await
    }

    async fn teardown(&self, name: &str, source: &ConnectionSource) {
        info!(datasource = name, handle_count = source.handle_count(), "disconnect start");
        for failure in self.hooks.run_destroy(name, source).await {
            self.report(name, &failure);
        }
        self.release(name, source).await;
        info!(datasource = name, "disconnect end");
    }

    /// Unregisters monitoring and destroys the physical data source.
    async fn release(&self, name: &str, source: &ConnectionSource) {
        let ids = source.take_monitor_ids();
        if let Some(sink) = &self.monitor {
            for id in &ids {
                sink.unregister(id);
            }
        }
        if let Err(e) = self.factory.destroy(name, source.driver().clone()).await {
            self.report(name, &e);
        }
    }

    fn report(&self, name: &str, err: &DbError) {
        match &self.monitor {
            Some(sink) => sink.report_teardown_error(name, err),
            None => tracing::warn!(datasource = name, error = %err, "connection source teardown error"),
        }
    }
}
