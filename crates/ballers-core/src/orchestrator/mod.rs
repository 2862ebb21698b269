//! Orquestador de corridas de sincronización.
//!
//! Secuencia (estrictamente secuencial, sin fan-out):
//! `Idle -> Fetching -> Reconciling -> Writing -> Done`, con `Failed`
//! alcanzable desde cualquier estado no `Idle`.
//!
//! Contrato de errores: cualquier fallo de la corrida (reintentos agotados,
//! error permanente de la fuente, cabecera inválida, cancelación, error de
//! persistencia) queda dentro del `SyncReport`; el llamador siempre recibe un
//! reporte. La única excepción es `RunInProgress` (otra corrida sobre la
//! misma fuente en este proceso o, vía `RecordStore::lock_source`, en otro),
//! que se devuelve como `Err` sin tocar nada.

mod registry;
mod report;
mod run_log;
mod state;

use std::sync::Arc;

use ballers_domain::ExternalRecord;
use chrono::Utc;
use log::{error, info, warn};

use crate::errors::RunInProgress;
use crate::reconcile::{reconcile, Reconciliation};
use crate::source::{CancellationToken, PageSource, SheetReader, SourceRef};
use crate::writer::{PersistenceWriter, RecordStore};

pub use registry::{RunGuard, RunRegistry};
pub use report::{ChangeSummary, SyncReport};
pub(crate) use report::RunTracker;
pub use run_log::{InMemoryRunLog, RunLog};
pub use state::SyncState;

pub struct SyncOrchestrator<S: PageSource, St: RecordStore> {
    reader: SheetReader<S>,
    store: St,
    registry: RunRegistry,
    run_log: Option<Arc<dyn RunLog>>,
}

impl<S: PageSource, St: RecordStore> SyncOrchestrator<S, St> {
    /// Orquestador sobre el registro de corridas global del proceso.
    pub fn new(reader: SheetReader<S>, store: St) -> Self {
        Self { reader, store, registry: RunRegistry::global(), run_log: None }
    }

    pub fn with_registry(mut self, registry: RunRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_run_log(mut self, run_log: Arc<dyn RunLog>) -> Self {
        self.run_log = Some(run_log);
        self
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Token para cancelar la corrida en curso (efectivo entre páginas).
    pub fn cancellation(&self) -> &CancellationToken {
        self.reader.cancellation()
    }

    /// Ejecuta una corrida completa sobre `source`.
    pub fn run(&self, source: &SourceRef) -> Result<SyncReport, RunInProgress> {
        let mut run = RunTracker::start(source.to_string());
        let _guard = self.registry.try_acquire(&source.lock_key(), run.run_id())?;
        info!("sync:start run={} source={source}", run.run_id());

        run.transition(SyncState::Fetching);
        // La guardia de arriba es por proceso; esta reserva cubre a otros
        // procesos sobre el mismo almacén y se mantiene hasta el final.
        let _lease = match self.store.lock_source(&source.lock_key()) {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                warn!("sync:busy run={} source={source} locked by another process", run.run_id());
                return Err(RunInProgress { source_key: source.lock_key() });
            }
            Err(e) => return Ok(self.finish(run.fail(e.into()))),
        };
        let externals: Vec<ExternalRecord> = match self.reader.fetch_all(source).collect::<Result<Vec<_>, _>>() {
            Ok(rows) => rows,
            Err(e) => return Ok(self.finish(run.fail(e.into()))),
        };
        run.fetched(externals.len());

        run.transition(SyncState::Reconciling);
        let existing = match self.store.load_all() {
            Ok(existing) => existing,
            Err(e) => return Ok(self.finish(run.fail(e.into()))),
        };
        let Reconciliation { decisions, warnings } = reconcile(self.reader.schema(), externals, &existing);
        for w in &warnings {
            warn!("sync:warning run={} {w}", run.run_id());
        }
        run.reconciled(&decisions, warnings);

        // Desde aquí no hay cancelación: la transacción termina o se revierte.
        run.transition(SyncState::Writing);
        match PersistenceWriter::new(&self.store).apply(&decisions, Utc::now()) {
            Ok(applied) => run.applied(applied),
            Err(e) => return Ok(self.finish(run.fail(e.into()))),
        }
        Ok(self.finish(run.finish()))
    }

    fn finish(&self, report: SyncReport) -> SyncReport {
        self.reader.cancellation().reset();
        let c = report.counts();
        if report.is_success() {
            info!("sync:done run={} source={} insert={} update={} unchanged={} orphan={} applied={} warnings={} ms={}",
                  report.run_id(),
                  report.source(),
                  c.insert,
                  c.update,
                  c.unchanged,
                  c.orphan,
                  report.applied(),
                  report.warnings().len(),
                  report.duration().num_milliseconds());
        } else {
            for e in report.errors() {
                error!("sync:failed run={} source={} err={e}", report.run_id(), report.source());
            }
        }
        if let Some(run_log) = &self.run_log {
            if let Err(e) = run_log.record(&report) {
                warn!("sync:run_log record failed run={} err={e}", report.run_id());
            }
        }
        report
    }
}
