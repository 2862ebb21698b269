use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::CanonicalKey;

/// Fila cruda de la hoja: columna → valor, en el orden de la cabecera.
///
/// `row_index` es la fila 1-based de la hoja (la cabecera es la fila 1). Se usa
/// sólo para reportar; la identidad la da la [`CanonicalKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub row_index: usize,
    pub fields: IndexMap<String, String>,
}

impl ExternalRecord {
    pub fn new(row_index: usize, fields: IndexMap<String, String>) -> Self {
        Self { row_index, fields }
    }

    /// Construye la fila emparejando cabecera y celdas. Las celdas faltantes
    /// (la API omite vacíos al final) quedan como cadena vacía.
    pub fn from_cells(row_index: usize, header: &[String], cells: &[String]) -> Self {
        let fields = header.iter()
                           .enumerate()
                           .map(|(i, h)| (h.trim().to_string(), cells.get(i).cloned().unwrap_or_default()))
                           .collect();
        Self { row_index, fields }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// Cambio de un atributo detectado al reconciliar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    /// `None`: el atributo no estaba almacenado.
    pub previous: Option<String>,
    /// `None`: el atributo ya no llega de la fuente (columna retirada).
    pub current: Option<String>,
}

/// Entidad persistida. Nunca se borra físicamente: los huérfanos pasan a
/// `active = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub key: CanonicalKey,
    pub label: String,
    pub attributes: BTreeMap<String, String>,
    pub sync_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
    pub active: bool,
}

impl DomainRecord {
    /// Registro nuevo (primer Insert).
    pub fn new(key: CanonicalKey, label: impl Into<String>, attributes: BTreeMap<String, String>, now: DateTime<Utc>) -> Self {
        let sync_hash = attributes_hash(&attributes);
        Self { key,
               label: label.into(),
               attributes,
               sync_hash,
               created_at: now,
               last_synced_at: now,
               active: true }
    }

    /// Versión actualizada con los atributos entrantes; conserva clave,
    /// etiqueta y `created_at`.
    pub fn updated_with(&self, attributes: BTreeMap<String, String>, now: DateTime<Utc>) -> Self {
        Self { key: self.key.clone(),
               label: self.label.clone(),
               sync_hash: attributes_hash(&attributes),
               attributes,
               created_at: self.created_at,
               last_synced_at: now,
               active: true }
    }

    /// Compara atributo por atributo contra `incoming` y devuelve sólo los que
    /// difieren: primero los de `incoming` (en su orden), luego los
    /// almacenados que ya no llegan.
    pub fn diff(&self, incoming: &BTreeMap<String, String>) -> Vec<FieldChange> {
        let changed = incoming.iter()
                              .filter(|(field, value)| self.attributes.get(*field) != Some(*value))
                              .map(|(field, value)| FieldChange { field: field.clone(),
                                                                  previous: self.attributes.get(field).cloned(),
                                                                  current: Some(value.clone()) });
        let removed = self.attributes
                          .iter()
                          .filter(|(field, _)| !incoming.contains_key(*field))
                          .map(|(field, value)| FieldChange { field: field.clone(),
                                                              previous: Some(value.clone()),
                                                              current: None });
        changed.chain(removed).collect()
    }
}

/// Hash SHA-256 (hex) de los atributos en forma canónica `k=v` ordenada.
pub fn attributes_hash(attributes: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (k, v) in attributes {
        hasher.update(k.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(v.as_bytes());
        hasher.update(b"\x1e");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn from_cells_pads_missing_trailing_cells() {
        let header = vec!["Nombre".to_string(), "Servicio".to_string()];
        let rec = ExternalRecord::from_cells(2, &header, &["Ana".to_string()]);
        assert_eq!(rec.get("Nombre"), Some("Ana"));
        assert_eq!(rec.get("Servicio"), Some(""));
    }

    #[test]
    fn diff_reports_only_changed_fields() {
        let now = Utc::now();
        let rec = DomainRecord::new(normalize("Ana").unwrap(), "Ana", attrs(&[("a", "1"), ("b", "2")]), now);
        let changes = rec.diff(&attrs(&[("a", "1"), ("b", "3"), ("c", "x")]));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], FieldChange { field: "b".into(), previous: Some("2".into()), current: Some("3".into()) });
        assert_eq!(changes[1].previous, None);
    }

    #[test]
    fn diff_reports_stored_fields_missing_from_incoming() {
        let rec = DomainRecord::new(normalize("Ana").unwrap(), "Ana", attrs(&[("a", "1"), ("old", "z")]), Utc::now());
        let changes = rec.diff(&attrs(&[("a", "1")]));
        assert_eq!(changes, vec![FieldChange { field: "old".into(), previous: Some("z".into()), current: None }]);
    }

    #[test]
    fn hash_depends_on_content_only() {
        let a = attrs(&[("x", "1"), ("y", "2")]);
        let b = attrs(&[("y", "2"), ("x", "1")]);
        assert_eq!(attributes_hash(&a), attributes_hash(&b));
        assert_ne!(attributes_hash(&a), attributes_hash(&attrs(&[("x", "12")])));
        assert_eq!(attributes_hash(&a).len(), 64);
    }
}
