//! Taxonomía de errores del pipeline.
//!
//! - `SourceError`: fallos de la fuente externa (transitorios se reintentan
//!   dentro del lector; el resto aborta la corrida).
//! - `PersistenceError`: fallos del almacenamiento (rollback completo).
//! - `RunInProgress`: guardia de concurrencia, único error que cruza la
//!   frontera del orquestador.
//! - `SyncWarning`: avisos no fatales que sólo se registran en el reporte.

use ballers_domain::HeaderMismatch;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceError {
    /// Red, timeout o rate-limit. Reintentable.
    #[error("transient source error: {0}")]
    Transient(String),
    /// Autenticación, hoja inexistente, petición inválida. No se reintenta.
    #[error("permanent source error: {0}")]
    Permanent(String),
    /// La cabecera no coincide con el esquema esperado; no se entrega ninguna
    /// fila.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(HeaderMismatch),
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("run cancelled between pages")]
    Cancelled,
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

/// Ya hay una corrida activa para la misma fuente.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("sync already in progress for {source_key}")]
pub struct RunInProgress {
    pub source_key: String,
}

/// Error que detuvo una corrida, tal como queda en el reporte.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncFailure {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Clasificación gruesa para decidir si vale la pena reintentar la corrida
/// completa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    Transient,
    Permanent,
    Validation,
    Cancelled,
}

pub fn classify_failure(failure: &SyncFailure) -> ErrorClass {
    match failure {
        SyncFailure::Source(SourceError::Transient(_)) | SyncFailure::Source(SourceError::RetriesExhausted { .. }) => {
            ErrorClass::Transient
        }
        SyncFailure::Source(SourceError::Permanent(_)) => ErrorClass::Permanent,
        SyncFailure::Source(SourceError::SchemaMismatch(_)) => ErrorClass::Validation,
        SyncFailure::Source(SourceError::Cancelled) => ErrorClass::Cancelled,
        SyncFailure::Persistence(PersistenceError::SerializationConflict)
        | SyncFailure::Persistence(PersistenceError::TransientIo(_)) => ErrorClass::Transient,
        SyncFailure::Persistence(PersistenceError::UniqueViolation(_))
        | SyncFailure::Persistence(PersistenceError::CheckViolation(_))
        | SyncFailure::Persistence(PersistenceError::ForeignKeyViolation(_)) => ErrorClass::Validation,
        SyncFailure::Persistence(_) => ErrorClass::Permanent,
    }
}

/// Avisos no fatales de una corrida.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncWarning {
    /// Dos filas producen la misma clave; gana la última.
    DuplicateKey { key: String, previous_row: usize, row: usize },
    /// La fila no tiene una clave normalizable y se descarta.
    InvalidRow { row: usize, reason: String },
}

impl std::fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncWarning::DuplicateKey { key, previous_row, row } => {
                write!(f, "duplicate key {key:?} in rows {previous_row} and {row} (last one wins)")
            }
            SyncWarning::InvalidRow { row, reason } => write!(f, "row {row} skipped: {reason}"),
        }
    }
}
