use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};
use uorm_datasource::udbc_mysql::MysqlDriverFactory;
use uorm_datasource::{
    DatasourceAddon, DatasourceConfig, DatasourceHandler, HandleCountRegistry, SourceRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("datasources.xml"));
    let config = if path.is_dir() {
        DatasourceConfig::from_dir(&path)?
    } else {
        DatasourceConfig::from_file(&path)?
    };

    let monitor = Arc::new(HandleCountRegistry::new("uorm-datasource"));
    let registry = SourceRegistry::new(config, Arc::new(MysqlDriverFactory)).monitor(monitor.clone());
    let handler = DatasourceHandler::new(Arc::new(registry));
    let addon = DatasourceAddon::new(&handler);

    addon.on_startup().await?;

    let rows = handler
        .with_default_source(|name, source| async move {
            let handle = source.open().await?;
            let rows = handle.query("SELECT 1 AS ok", &[]).await?;
            println!("{}: open handles while querying = {}", name, source.handle_count());
            Ok(rows)
        })
        .await?;
    println!("{:?}", rows);

    for snapshot in monitor.snapshot() {
        println!("{} -> {} open handle(s), since {}", snapshot.name, snapshot.handle_count, snapshot.registered_at);
    }

    addon.on_shutdown().await?;
    Ok(())
}
