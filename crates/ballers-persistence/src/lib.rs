//! ballers-persistence
//!
//! Backend Postgres (Diesel + r2d2) para el pipeline de sincronización.
//!
//! Módulos:
//! - `pg`: `PgRecordStore` / `PgRunLog` y utilidades de pool.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: configuración de conexión desde `.env` / entorno.
//! - `schema`: tablas Diesel declaradas para compilar queries.
//! - `error`: mapeo de errores Diesel a `PersistenceError`.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig, DbConfigError};
pub use pg::{build_pool, build_pool_from_config, ConnectionProvider, PgPool, PgRecordStore, PgRunLog, PoolProvider};
