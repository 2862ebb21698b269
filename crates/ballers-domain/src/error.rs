use thiserror::Error;

/// Errores del dominio de sincronización.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Entrada inválida para normalizar (vacía o sólo espacios). Indica un
    /// error del llamador, no de la fuente.
    #[error("Entrada inválida: {0}")]
    InvalidInput(String),
    #[error("Esquema inválido: {0}")]
    InvalidSchema(String),
}
