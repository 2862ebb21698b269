//! Implementaciones Postgres (Diesel) de los traits del core.
//!
//! - `PgRecordStore`: tabla `domain_records` con paridad 1:1 respecto a
//!   `InMemoryRecordStore` (upsert por clave conservando `created_at`,
//!   soft-delete, commit atómico).
//! - `PgRunLog`: historial de corridas en `sync_runs`.
//!
//! Las lecturas y el commit de la unidad de trabajo se reintentan ante
//! errores transitorios con un backoff muy pequeño.

mod records;
mod run_log;

use std::time::Duration;

use ballers_core::PersistenceError;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager};
use log::warn;

use crate::config::DbConfig;
use crate::error::is_retryable;
use crate::migrations::run_pending_migrations;

pub use records::{PgRecordStore, PgUnitOfWork};
pub use run_log::PgRunLog;

/// Conexiones mínimas para una corrida: reserva de fuente + trabajo.
pub const MIN_POOL_SIZE: u32 = 2;

/// Pool r2d2 de conexiones Postgres.
///
/// Se construye con `min_idle` y `max_size`; al construirlo se corren las
/// migraciones pendientes una sola vez.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Contrato: devuelve una conexión válida o `PersistenceError::TransientIo`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

/// `ConnectionProvider` respaldado por un `PgPool`.
#[derive(Clone)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Retry simple con backoff lineal muy pequeño (hasta 3 reintentos: 15ms,
/// 30ms, 45ms). Sólo repite la unidad de trabajo provista por `f`.
pub(crate) fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Construye un pool Postgres r2d2 y ejecuta las migraciones pendientes.
///
/// Si `min_size > max_size` se usa `min_size = max_size`; `min_size` 0 se
/// eleva a 1 y `max_size` a 2 (una corrida retiene una conexión para la
/// reserva de la fuente y usa otra para trabajar).
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(MIN_POOL_SIZE);
    if validated_min > validated_max {
        warn!("build_pool: min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(validated_min.min(validated_max)))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Pool ya migrado a partir de un `DbConfig`.
pub fn build_pool_from_config(cfg: &DbConfig) -> Result<PgPool, PersistenceError> {
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
