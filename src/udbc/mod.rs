pub mod value;

pub mod connection;
pub mod driver;

/// Datasource name used when the caller does not pick one.
pub const DEFAULT_DB_NAME: &'static str = "default";

/// Pool sizing read by drivers from a datasource's pass-through options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub max_open_conns: u64, // 设置池最大连接数
    pub max_idle_conns: u64, // 设置池最大空闲数
    pub max_lifetime: u64,   // 设置连接最大生命周期
    pub timeout: u64,        // 设置连接池获取连接的超时时间
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_open_conns: 10,
            max_idle_conns: 2,
            max_lifetime: 30 * 60,
            timeout: 10,
        }
    }
}
