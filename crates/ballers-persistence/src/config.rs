//! Configuración de conexión desde variables de entorno.
//! Convención `DATABASE_URL` más parámetros opcionales de pool.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use thiserror::Error;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_MIN_CONNECTIONS: u32 = 2;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DbConfigError {
    #[error("DATABASE_URL no definido")]
    MissingUrl,
    #[error("valor inválido para {name}: {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, DbConfigError> {
        init_dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Igual que `from_env` pero con una función de búsqueda inyectable
    /// (tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DbConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty())
                                        .ok_or(DbConfigError::MissingUrl)?;
        let min_connections = parse_or(&lookup, "DATABASE_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS)?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        Ok(Self { url, min_connections, max_connections })
    }
}

fn parse_or<F>(lookup: &F, name: &'static str, default: u32) -> Result<u32, DbConfigError>
    where F: Fn(&str) -> Option<String>
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| DbConfigError::InvalidNumber { name, value: raw }),
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_pool_sizes_missing() {
        let cfg = DbConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/ballers")])).unwrap();
        assert_eq!(cfg.min_connections, 2);
        assert_eq!(cfg.max_connections, 16);
    }

    #[test]
    fn missing_url_and_bad_numbers_are_errors() {
        assert_eq!(DbConfig::from_lookup(lookup(&[])), Err(DbConfigError::MissingUrl));
        let err = DbConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("DATABASE_MAX_CONNECTIONS", "muchas")]));
        assert!(matches!(err, Err(DbConfigError::InvalidNumber { name: "DATABASE_MAX_CONNECTIONS", .. })));
    }
}
