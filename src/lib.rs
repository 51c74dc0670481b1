pub mod db;
pub mod db_config;
pub mod errors;
pub mod relationships;
pub mod schema;
