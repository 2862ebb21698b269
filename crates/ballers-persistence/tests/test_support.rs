#![allow(dead_code)]

use ballers_domain::{normalize, DomainRecord};
use ballers_persistence::config::DbConfig;
use ballers_persistence::pg::{build_pool, PgPool, PoolProvider};
use chrono::Utc;
use once_cell::sync::Lazy;

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    if std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let cfg = DbConfig::from_env().ok()?;
    match build_pool(&cfg.url, 1, 2) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("No se pudo construir pool de test: {e}");
            None
        }
    }
});

pub fn with_pool<F, R>(f: F) -> Option<R>
    where F: FnOnce(&PgPool) -> R
{
    let out = TEST_POOL.as_ref().map(f);
    if out.is_none() {
        eprintln!("DATABASE_URL no definido: omitiendo test");
    }
    out
}

pub fn provider(pool: &PgPool) -> PoolProvider {
    PoolProvider { pool: pool.clone() }
}

/// Nombre único por test para no chocar con filas de otras corridas.
pub fn unique_name(base: &str) -> String {
    format!("{base} {}", uuid::Uuid::new_v4().simple())
}

pub fn record(name: &str, servicio: &str) -> DomainRecord {
    let attrs = [("Servicio".to_string(), servicio.to_string())].into_iter().collect();
    DomainRecord::new(normalize(name).unwrap(), name, attrs, Utc::now())
}
