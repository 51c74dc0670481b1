use social_graph::db::PgStore;
use social_graph::db_config::DbConfig;
use social_graph::errors::ConfigError;

use log::{error, info};

#[tokio::main]
async fn main() -> Result<(), ConfigError> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = DbConfig::from_env()?;
    let store = PgStore::new(config.get_pool()?);

    let applied = store.run_migrations()?;
    info!("Schema is up to date ({} migrations applied)", applied);

    match store.test_connection().await {
        Ok(_) => info!("Db Connection established!"),
        Err(error) => {
            error!("Db test failed: {:#?}", error);
            return Err(error.into());
        }
    };
    Ok(())
}
