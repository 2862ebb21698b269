//! Reconciliación de filas externas contra registros existentes.
//!
//! Algoritmo:
//! 1. Cada fila externa se mapea a su `CanonicalKey` (columnas clave del
//!    esquema, normalizadas). Filas sin clave válida se descartan con aviso.
//! 2. Claves repetidas: gana la última fila, pero la decisión conserva la
//!    posición de la primera aparición. Se registra `DuplicateKey`.
//! 3. Clave ausente en `existing` → `Insert`; presente → comparación campo a
//!    campo: con diferencias (o registro inactivo que reaparece) → `Update`,
//!    sin diferencias → `Unchanged`.
//! 4. Claves de `existing` no visitadas → `Orphan`, en el orden almacenado.
//!
//! El orden de salida es estable (reportes reproducibles) pero no tiene
//! semántica adicional.

use std::collections::BTreeMap;

use ballers_domain::{normalize_parts, CanonicalKey, DomainRecord, ExternalRecord, FieldChange, SheetSchema};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::SyncWarning;

/// Resultado de reconciliar una clave. Nunca hay dos decisiones para la misma
/// clave en un mismo lote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationDecision {
    Insert {
        key: CanonicalKey,
        label: String,
        attributes: BTreeMap<String, String>,
        incoming: ExternalRecord,
    },
    Update {
        existing: DomainRecord,
        incoming: ExternalRecord,
        attributes: BTreeMap<String, String>,
        changes: Vec<FieldChange>,
        /// El registro estaba inactivo y vuelve a aparecer en la fuente.
        reactivated: bool,
    },
    Unchanged {
        existing: DomainRecord,
    },
    Orphan {
        existing: DomainRecord,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionKind {
    Insert,
    Update,
    Unchanged,
    Orphan,
}

impl ReconciliationDecision {
    pub fn key(&self) -> &CanonicalKey {
        match self {
            ReconciliationDecision::Insert { key, .. } => key,
            ReconciliationDecision::Update { existing, .. }
            | ReconciliationDecision::Unchanged { existing }
            | ReconciliationDecision::Orphan { existing } => &existing.key,
        }
    }

    pub fn kind(&self) -> DecisionKind {
        match self {
            ReconciliationDecision::Insert { .. } => DecisionKind::Insert,
            ReconciliationDecision::Update { .. } => DecisionKind::Update,
            ReconciliationDecision::Unchanged { .. } => DecisionKind::Unchanged,
            ReconciliationDecision::Orphan { .. } => DecisionKind::Orphan,
        }
    }
}

/// Conteos por tipo de decisión.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    pub insert: usize,
    pub update: usize,
    pub unchanged: usize,
    pub orphan: usize,
}

impl DecisionCounts {
    pub fn tally(decisions: &[ReconciliationDecision]) -> Self {
        let mut counts = Self::default();
        for d in decisions {
            match d.kind() {
                DecisionKind::Insert => counts.insert += 1,
                DecisionKind::Update => counts.update += 1,
                DecisionKind::Unchanged => counts.unchanged += 1,
                DecisionKind::Orphan => counts.orphan += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.insert + self.update + self.unchanged + self.orphan
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub decisions: Vec<ReconciliationDecision>,
    pub warnings: Vec<SyncWarning>,
}

impl Reconciliation {
    pub fn counts(&self) -> DecisionCounts {
        DecisionCounts::tally(&self.decisions)
    }
}

pub fn reconcile<I>(schema: &SheetSchema, externals: I, existing: &IndexMap<CanonicalKey, DomainRecord>) -> Reconciliation
    where I: IntoIterator<Item = ExternalRecord>
{
    let mut warnings = Vec::new();
    // Posición de primera aparición, contenido de la última.
    let mut incoming: IndexMap<CanonicalKey, ExternalRecord> = IndexMap::new();
    for record in externals {
        let key = match normalize_parts(&schema.key_values(&record)) {
            Ok(k) => k,
            Err(e) => {
                warnings.push(SyncWarning::InvalidRow { row: record.row_index, reason: e.to_string() });
                continue;
            }
        };
        if let Some(previous) = incoming.get_mut(&key) {
            warnings.push(SyncWarning::DuplicateKey { key: key.to_string(),
                                                      previous_row: previous.row_index,
                                                      row: record.row_index });
            *previous = record;
        } else {
            incoming.insert(key, record);
        }
    }

    let mut decisions = Vec::with_capacity(incoming.len() + existing.len());
    for (key, record) in &incoming {
        let attributes = schema.attributes_of(record);
        let decision = match existing.get(key) {
            None => ReconciliationDecision::Insert { key: key.clone(),
                                                     label: schema.label_of(record),
                                                     attributes,
                                                     incoming: record.clone() },
            Some(current) => {
                let changes = current.diff(&attributes);
                if changes.is_empty() && current.active {
                    ReconciliationDecision::Unchanged { existing: current.clone() }
                } else {
                    ReconciliationDecision::Update { existing: current.clone(),
                                                     incoming: record.clone(),
                                                     attributes,
                                                     changes,
                                                     reactivated: !current.active }
                }
            }
        };
        decisions.push(decision);
    }
    for (key, current) in existing {
        if !incoming.contains_key(key) {
            decisions.push(ReconciliationDecision::Orphan { existing: current.clone() });
        }
    }

    let result = Reconciliation { decisions, warnings };
    let c = result.counts();
    debug!("reconcile:done insert={} update={} unchanged={} orphan={} warnings={}",
           c.insert,
           c.update,
           c.unchanged,
           c.orphan,
           result.warnings.len());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballers_domain::normalize;
    use chrono::Utc;

    fn schema() -> SheetSchema {
        SheetSchema::new(["Nombre"], ["Servicio"]).unwrap()
    }

    fn ext(row: usize, name: &str, servicio: &str) -> ExternalRecord {
        let header = vec!["Nombre".to_string(), "Servicio".to_string()];
        ExternalRecord::from_cells(row, &header, &[name.to_string(), servicio.to_string()])
    }

    fn existing(entries: &[(&str, &str, bool)]) -> IndexMap<CanonicalKey, DomainRecord> {
        entries.iter()
               .map(|(name, servicio, active)| {
                   let key = normalize(name).unwrap();
                   let attrs = [("Servicio".to_string(), servicio.to_string())].into_iter().collect();
                   let mut rec = DomainRecord::new(key.clone(), *name, attrs, Utc::now());
                   rec.active = *active;
                   (key, rec)
               })
               .collect()
    }

    #[test]
    fn update_carries_only_changed_fields() {
        let ex = existing(&[("Ana García", "Basic", true)]);
        let r = reconcile(&schema(), vec![ext(2, "ana garcia", "Elite")], &ex);
        match &r.decisions[..] {
            [ReconciliationDecision::Update { changes, reactivated, .. }] => {
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].field, "Servicio");
                assert_eq!(changes[0].previous.as_deref(), Some("Basic"));
                assert_eq!(changes[0].current.as_deref(), Some("Elite"));
                assert!(!reactivated);
            }
            other => panic!("decisiones inesperadas: {other:?}"),
        }
    }

    #[test]
    fn stored_attribute_no_longer_in_schema_is_an_update() {
        let key = normalize("Ana García").unwrap();
        let attrs = [("Servicio".to_string(), "Basic".to_string()), ("Notas".to_string(), "vieja".to_string())];
        let rec = DomainRecord::new(key.clone(), "Ana García", attrs.into_iter().collect(), Utc::now());
        let ex: IndexMap<_, _> = [(key, rec)].into_iter().collect();
        let r = reconcile(&schema(), vec![ext(2, "Ana García", "Basic")], &ex);
        match &r.decisions[..] {
            [ReconciliationDecision::Update { changes, attributes, .. }] => {
                assert_eq!(changes,
                           &vec![FieldChange { field: "Notas".into(), previous: Some("vieja".into()), current: None }]);
                assert!(!attributes.contains_key("Notas"));
            }
            other => panic!("decisiones inesperadas: {other:?}"),
        }
    }

    #[test]
    fn inactive_record_reappearing_is_reactivated() {
        let ex = existing(&[("Ana García", "Basic", false)]);
        let r = reconcile(&schema(), vec![ext(2, "Ana García", "Basic")], &ex);
        assert!(matches!(&r.decisions[..],
                         [ReconciliationDecision::Update { reactivated: true, changes, .. }] if changes.is_empty()));
    }

    #[test]
    fn duplicate_keys_last_wins_first_position() {
        let rows = vec![ext(2, "Ana García", "Basic"), ext(3, "Luis", "Pro"), ext(4, "ANA GARCIA", "Elite")];
        let r = reconcile(&schema(), rows, &IndexMap::new());
        assert_eq!(r.decisions.len(), 2);
        assert_eq!(r.decisions[0].key().as_str(), "ana garcia");
        match &r.decisions[0] {
            ReconciliationDecision::Insert { attributes, incoming, .. } => {
                assert_eq!(attributes.get("Servicio").map(String::as_str), Some("Elite"));
                assert_eq!(incoming.row_index, 4);
            }
            other => panic!("esperaba Insert: {other:?}"),
        }
        assert_eq!(r.warnings,
                   vec![SyncWarning::DuplicateKey { key: "ana garcia".into(), previous_row: 2, row: 4 }]);
    }

    #[test]
    fn rows_without_key_are_skipped_with_warning() {
        let r = reconcile(&schema(), vec![ext(2, "   ", "Basic")], &IndexMap::new());
        assert!(r.decisions.is_empty());
        assert!(matches!(&r.warnings[..], [SyncWarning::InvalidRow { row: 2, .. }]));
    }

    #[test]
    fn orphans_follow_stored_order() {
        let ex = existing(&[("Zeta", "A", true), ("Alfa", "B", true), ("Ana", "C", false)]);
        let r = reconcile(&schema(), Vec::new(), &ex);
        let keys: Vec<_> = r.decisions.iter().map(|d| d.key().as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alfa", "ana"]);
        assert!(r.decisions.iter().all(|d| d.kind() == DecisionKind::Orphan));
    }
}
