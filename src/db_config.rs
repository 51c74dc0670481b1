use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use std::env;

use crate::errors::ConfigError;

pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

const DEFAULT_POOL_SIZE: u32 = 15;

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub database_url: String,
    pub pool_size: u32,
}

impl DbConfig {
    /// Reads `DATABASE_URL` and the optional `DB_POOL_SIZE` from the environment.
    /// Call `dotenvy::dotenv()` first if the values live in a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let pool_size = match env::var("DB_POOL_SIZE") {
            Ok(value) => Self::parse_pool_size(&value)?,
            Err(_) => DEFAULT_POOL_SIZE,
        };
        Ok(DbConfig { database_url, pool_size })
    }

    fn parse_pool_size(value: &str) -> Result<u32, ConfigError> {
        match value.trim().parse::<u32>() {
            Ok(size) if size > 0 => Ok(size),
            _ => Err(ConfigError::Invalid {
                name: "DB_POOL_SIZE",
                value: value.to_owned(),
            }),
        }
    }

    pub fn get_pool(&self) -> Result<Pool, ConfigError> {
        let manager = ConnectionManager::<PgConnection>::new(&self.database_url);
        let pool = r2d2::Pool::builder()
            .max_size(self.pool_size)
            .build(manager)?;
        Ok(pool)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    pub fn test_pool_size_parsing() {
        assert_eq!(DbConfig::parse_pool_size("4").unwrap(), 4);
        assert_eq!(DbConfig::parse_pool_size(" 20 ").unwrap(), 20);
        assert!(matches!(
            DbConfig::parse_pool_size("0"),
            Err(ConfigError::Invalid { name: "DB_POOL_SIZE", .. })
        ));
        assert!(DbConfig::parse_pool_size("many").is_err());
    }
}
