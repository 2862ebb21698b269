use ballers_domain::DomainError;
use ballers_persistence::DbConfigError;
use thiserror::Error;

/// Errores al leer la configuración de la aplicación.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Variable requerida no definida: {0}")]
    Missing(&'static str),
    #[error("Valor inválido para {name}: {value:?} ({reason})")]
    Invalid { name: &'static str, value: String, reason: String },
    #[error("Esquema de hoja inválido: {0}")]
    Schema(#[from] DomainError),
    #[error("Configuración de base de datos: {0}")]
    Database(#[from] DbConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variant_format() {
        assert_eq!(ConfigError::Missing("BALLERS_SHEET_ID").to_string(),
                   "Variable requerida no definida: BALLERS_SHEET_ID");
    }

    #[test]
    fn database_errors_convert() {
        let err: ConfigError = DbConfigError::MissingUrl.into();
        assert_eq!(err.to_string(), "Configuración de base de datos: DATABASE_URL no definido");
    }
}
