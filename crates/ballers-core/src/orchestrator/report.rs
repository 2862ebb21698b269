//! Reporte de una corrida: única superficie de salida hacia la capa de
//! presentación.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SyncState;
use crate::errors::{SyncFailure, SyncWarning};
use crate::reconcile::{DecisionCounts, ReconciliationDecision};

/// Resultado de una corrida. Se crea nuevo en cada `run` y no expone
/// mutadores: una vez devuelto es de sólo lectura.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    run_id: Uuid,
    source: String,
    state: SyncState,
    rows_fetched: usize,
    counts: DecisionCounts,
    deactivated: usize,
    applied: usize,
    errors: Vec<SyncFailure>,
    warnings: Vec<SyncWarning>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn state(&self) -> SyncState {
        self.state
    }
    pub fn rows_fetched(&self) -> usize {
        self.rows_fetched
    }
    pub fn counts(&self) -> DecisionCounts {
        self.counts
    }
    /// Filas que cambiaron realmente en la base (0 en una corrida repetida
    /// sin cambios en la fuente).
    pub fn applied(&self) -> usize {
        self.applied
    }
    pub fn errors(&self) -> &[SyncFailure] {
        &self.errors
    }
    pub fn warnings(&self) -> &[SyncWarning] {
        &self.warnings
    }
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
    pub fn is_success(&self) -> bool {
        self.state == SyncState::Done && self.errors.is_empty()
    }

    /// Cambios efectivos de la corrida, para notificaciones.
    pub fn change_summary(&self) -> ChangeSummary {
        if !self.is_success() {
            return ChangeSummary::default();
        }
        ChangeSummary { imported: self.counts.insert, updated: self.counts.update, deactivated: self.deactivated }
    }
}

/// Acumula el estado de una corrida en curso y produce el `SyncReport` final.
#[derive(Debug)]
pub(crate) struct RunTracker {
    report: SyncReport,
}

impl RunTracker {
    pub(crate) fn start(source: String) -> Self {
        let now = Utc::now();
        Self { report: SyncReport { run_id: Uuid::new_v4(),
                                    source,
                                    state: SyncState::Idle,
                                    rows_fetched: 0,
                                    counts: DecisionCounts::default(),
                                    deactivated: 0,
                                    applied: 0,
                                    errors: Vec::new(),
                                    warnings: Vec::new(),
                                    started_at: now,
                                    finished_at: now } }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.report.run_id
    }

    /// Avanza la máquina de estados. Una transición inválida es un bug del
    /// orquestador; se registra y se ignora.
    pub(crate) fn transition(&mut self, next: SyncState) {
        let current = self.report.state;
        if !current.can_transition_to(next) {
            log::error!("run {}: invalid transition {} -> {}", self.report.run_id, current.as_str(), next.as_str());
            debug_assert!(false, "invalid transition {current:?} -> {next:?}");
            return;
        }
        log::debug!("run {}: {} -> {}", self.report.run_id, current.as_str(), next.as_str());
        self.report.state = next;
    }

    pub(crate) fn fetched(&mut self, rows: usize) {
        self.report.rows_fetched = rows;
    }

    pub(crate) fn reconciled(&mut self, decisions: &[ReconciliationDecision], warnings: Vec<SyncWarning>) {
        self.report.counts = DecisionCounts::tally(decisions);
        self.report.deactivated = decisions.iter()
                                           .filter(|d| matches!(d, ReconciliationDecision::Orphan { existing } if existing.active))
                                           .count();
        self.report.warnings = warnings;
    }

    pub(crate) fn applied(&mut self, applied: usize) {
        self.report.applied = applied;
    }

    pub(crate) fn fail(mut self, failure: SyncFailure) -> SyncReport {
        self.transition(SyncState::Failed);
        self.report.errors.push(failure);
        self.finish()
    }

    pub(crate) fn finish(mut self) -> SyncReport {
        if self.report.state == SyncState::Writing {
            self.transition(SyncState::Done);
        }
        self.report.finished_at = Utc::now();
        self.report
    }
}

/// Conteo de cambios efectivos (importadas, actualizadas, desactivadas).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub imported: usize,
    pub updated: usize,
    pub deactivated: usize,
}

impl ChangeSummary {
    pub fn total(&self) -> usize {
        self.imported + self.updated + self.deactivated
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Texto breve para notificar, p. ej. `"2 importadas, 1 actualizada y 3
    /// desactivadas"`. `None` si no hubo cambios.
    pub fn message(&self) -> Option<String> {
        fn part(n: usize, singular: &str) -> Option<String> {
            match n {
                0 => None,
                1 => Some(format!("1 {singular}")),
                _ => Some(format!("{n} {singular}s")),
            }
        }
        let parts: Vec<String> = [part(self.imported, "importada"),
                                  part(self.updated, "actualizada"),
                                  part(self.deactivated, "desactivada")].into_iter()
                                                                        .flatten()
                                                                        .collect();
        match parts.as_slice() {
            [] => None,
            [only] => Some(only.clone()),
            [init @ .., last] => Some(format!("{} y {}", init.join(", "), last)),
        }
    }
}
