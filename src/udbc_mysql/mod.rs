pub mod connection;
pub mod pool;
pub mod value_codec;

pub use pool::{MysqlDriver, MysqlDriverFactory};
