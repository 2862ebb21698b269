//! Esquema esperado de la hoja: qué columnas forman la clave y cuáles son
//! atributos de negocio.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::ExternalRecord;
use crate::DomainError;

/// Columnas esperadas en la fila de cabecera.
///
/// Invariantes (verificadas en [`SheetSchema::new`]):
/// - al menos una columna de clave;
/// - ningún nombre repetido entre clave y atributos;
/// - las columnas numéricas son un subconjunto de los atributos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSchema {
    key_columns: Vec<String>,
    attribute_columns: Vec<String>,
    numeric_columns: BTreeSet<String>,
}

/// Diferencias entre la cabecera declarada por la fuente y el esquema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMismatch {
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
    pub duplicated: Vec<String>,
}

impl fmt::Display for HeaderMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
               "missing={:?} unexpected={:?} duplicated={:?}",
               self.missing, self.unexpected, self.duplicated)
    }
}

impl SheetSchema {
    pub fn new<K, A>(key_columns: K, attribute_columns: A) -> Result<Self, DomainError>
        where K: IntoIterator,
              K::Item: Into<String>,
              A: IntoIterator,
              A::Item: Into<String>
    {
        let key_columns: Vec<String> = key_columns.into_iter().map(|c| c.into().trim().to_string()).collect();
        let attribute_columns: Vec<String> =
            attribute_columns.into_iter().map(|c| c.into().trim().to_string()).collect();
        if key_columns.is_empty() {
            return Err(DomainError::InvalidSchema("se requiere al menos una columna de clave".into()));
        }
        let mut seen = BTreeSet::new();
        for c in key_columns.iter().chain(attribute_columns.iter()) {
            if c.is_empty() {
                return Err(DomainError::InvalidSchema("nombre de columna vacío".into()));
            }
            if !seen.insert(c.as_str()) {
                return Err(DomainError::InvalidSchema(format!("columna repetida: {c}")));
            }
        }
        Ok(Self { key_columns, attribute_columns, numeric_columns: BTreeSet::new() })
    }

    /// Declara columnas cuyo valor se coacciona a número (inválidos → `"0"`).
    pub fn with_numeric_columns<I, S>(mut self, columns: I) -> Result<Self, DomainError>
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        for c in columns {
            let c = c.into().trim().to_string();
            if !self.attribute_columns.contains(&c) {
                return Err(DomainError::InvalidSchema(format!("columna numérica desconocida: {c}")));
            }
            self.numeric_columns.insert(c);
        }
        Ok(self)
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn attribute_columns(&self) -> &[String] {
        &self.attribute_columns
    }

    /// Todas las columnas requeridas (clave primero, luego atributos).
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.key_columns.iter().chain(self.attribute_columns.iter()).map(String::as_str)
    }

    /// Compara la cabecera recibida contra el esquema. El orden de columnas no
    /// importa; faltantes, sobrantes y repetidas sí.
    pub fn validate_header(&self, header: &[String]) -> Result<(), HeaderMismatch> {
        let mut mismatch = HeaderMismatch::default();
        let mut seen = BTreeSet::new();
        for cell in header.iter().map(|h| h.trim()) {
            if !seen.insert(cell) {
                mismatch.duplicated.push(cell.to_string());
            } else if !self.required_columns().any(|c| c == cell) {
                mismatch.unexpected.push(cell.to_string());
            }
        }
        mismatch.missing = self.required_columns()
                               .filter(|c| !seen.contains(c))
                               .map(str::to_string)
                               .collect();
        if mismatch == HeaderMismatch::default() {
            Ok(())
        } else {
            Err(mismatch)
        }
    }

    /// Normaliza el valor crudo de una celda según la columna.
    pub fn normalize_value(&self, column: &str, raw: &str) -> String {
        let trimmed = raw.trim();
        if self.numeric_columns.contains(column) {
            return match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => v.to_string(),
                _ => "0".to_string(),
            };
        }
        trimmed.to_string()
    }

    /// Valores crudos de las columnas clave, en orden de esquema.
    pub fn key_values<'a>(&self, record: &'a ExternalRecord) -> Vec<&'a str> {
        self.key_columns.iter().map(|c| record.get(c).unwrap_or("").trim()).collect()
    }

    /// Etiqueta legible (valores de clave tal cual, sin normalizar).
    pub fn label_of(&self, record: &ExternalRecord) -> String {
        self.key_values(record).into_iter().filter(|v| !v.is_empty()).collect::<Vec<_>>().join(" ")
    }

    /// Atributos de negocio de una fila, ya normalizados por columna.
    pub fn attributes_of(&self, record: &ExternalRecord) -> BTreeMap<String, String> {
        self.attribute_columns
            .iter()
            .map(|c| (c.clone(), self.normalize_value(c, record.get(c).unwrap_or(""))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SheetSchema {
        SheetSchema::new(["Nombre"], ["Servicio", "Cuota"]).unwrap()
                                                           .with_numeric_columns(["Cuota"])
                                                           .unwrap()
    }

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn header_order_does_not_matter() {
        assert!(schema().validate_header(&header(&["Cuota", " Nombre ", "Servicio"])).is_ok());
    }

    #[test]
    fn header_reports_missing_unexpected_and_duplicated() {
        let err = schema().validate_header(&header(&["Nombre", "Nombre", "Notas"])).unwrap_err();
        assert_eq!(err.missing, vec!["Servicio", "Cuota"]);
        assert_eq!(err.unexpected, vec!["Notas"]);
        assert_eq!(err.duplicated, vec!["Nombre"]);
    }

    #[test]
    fn numeric_columns_are_coerced() {
        let s = schema();
        assert_eq!(s.normalize_value("Cuota", " 12.50 "), "12.5");
        assert_eq!(s.normalize_value("Cuota", "n/a"), "0");
        assert_eq!(s.normalize_value("Servicio", "  Elite "), "Elite");
    }

    #[test]
    fn rejects_invalid_schemas() {
        assert!(SheetSchema::new(Vec::<String>::new(), ["A"]).is_err());
        assert!(SheetSchema::new(["A"], ["A"]).is_err());
        assert!(SheetSchema::new(["A"], ["B"]).unwrap().with_numeric_columns(["C"]).is_err());
    }
}
