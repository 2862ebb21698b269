//! Mapeo de errores de Diesel / conexión a `PersistenceError`.

use ballers_core::PersistenceError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

pub fn from_diesel(err: DieselError) -> PersistenceError {
    match err {
        DieselError::NotFound => PersistenceError::NotFound("row".into()),
        DieselError::DatabaseError(kind, info) => match kind {
            DatabaseErrorKind::UniqueViolation => PersistenceError::UniqueViolation(info.message().to_string()),
            DatabaseErrorKind::CheckViolation => PersistenceError::CheckViolation(info.message().to_string()),
            DatabaseErrorKind::ForeignKeyViolation => PersistenceError::ForeignKeyViolation(info.message().to_string()),
            DatabaseErrorKind::SerializationFailure => PersistenceError::SerializationConflict,
            DatabaseErrorKind::ClosedConnection => PersistenceError::TransientIo(info.message().to_string()),
            other => PersistenceError::Unknown(format!("db error kind {:?}: {}", other, info.message())),
        },
        DieselError::DeserializationError(e) => PersistenceError::Unknown(format!("deser: {e}")),
        DieselError::SerializationError(e) => PersistenceError::Unknown(format!("ser: {e}")),
        DieselError::RollbackErrorOnCommit { rollback_error, commit_error } => {
            PersistenceError::Unknown(format!("rollback={rollback_error}; commit={commit_error}"))
        }
        DieselError::BrokenTransactionManager => PersistenceError::TransientIo("broken transaction manager".into()),
        DieselError::QueryBuilderError(e) => PersistenceError::Unknown(format!("query builder: {e}")),
        other => PersistenceError::Unknown(format!("unhandled diesel error: {other:?}")),
    }
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
///
/// Además de las variantes explícitas, algunos mensajes de desconexión o
/// timeout llegan como `Unknown` con texto.
pub fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict | PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}
