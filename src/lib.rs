pub mod addon;
pub mod config;
pub mod error;
pub mod handler;
pub mod hooks;
pub mod monitor;
pub mod registry;
pub mod source;
pub mod tracker;
pub mod udbc;
#[cfg(feature = "mysql")]
pub mod udbc_mysql;

pub use addon::DatasourceAddon;
pub use config::{DatasourceConfig, DatasourceSettings};
pub use error::DbError;
pub use handler::DatasourceHandler;
pub use hooks::{LifecycleHook, LifecycleHooks};
pub use monitor::{HandleCountRegistry, HandleCountSnapshot, MonitoringSink};
pub use registry::SourceRegistry;
pub use source::{ConnectionSource, Handle, Transaction};
pub use tracker::HandleTracker;
