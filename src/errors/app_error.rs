use ballers_core::{PersistenceError, RunInProgress, SourceError};
use thiserror::Error;

use super::ConfigError;

/// Error de nivel aplicación: arranque (configuración, pool, cliente HTTP) o
/// una corrida rechazada por la guardia de concurrencia. Los fallos dentro
/// de una corrida viajan en el `SyncReport`, no aquí.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error de configuración: {0}")]
    Config(#[from] ConfigError),
    #[error("Error de persistencia: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Error de la fuente: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Busy(#[from] RunInProgress),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_format() {
        let err = AppError::from(PersistenceError::TransientIo("pool".into()));
        assert_eq!(err.to_string(), "Error de persistencia: transient IO / connection pool error: pool");
        let busy = AppError::from(RunInProgress { source_key: "id:Hoja 1!A:G".into() });
        assert_eq!(busy.to_string(), "sync already in progress for id:Hoja 1!A:G");
    }
}
