use std::sync::Mutex;

use super::SyncReport;
use crate::errors::PersistenceError;

/// Destino opcional donde el orquestador deja cada reporte terminado
/// (historial de corridas).
pub trait RunLog: Send + Sync {
    fn record(&self, report: &SyncReport) -> Result<(), PersistenceError>;
    /// Últimos `limit` reportes, del más reciente al más antiguo.
    fn recent(&self, limit: usize) -> Result<Vec<SyncReport>, PersistenceError>;
}

#[derive(Debug, Default)]
pub struct InMemoryRunLog {
    reports: Mutex<Vec<SyncReport>>,
}

impl InMemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunLog for InMemoryRunLog {
    fn record(&self, report: &SyncReport) -> Result<(), PersistenceError> {
        self.reports
            .lock()
            .map_err(|e| PersistenceError::Unknown(format!("poisoned run log: {e}")))?
            .push(report.clone());
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<SyncReport>, PersistenceError> {
        let reports = self.reports
                          .lock()
                          .map_err(|e| PersistenceError::Unknown(format!("poisoned run log: {e}")))?;
        Ok(reports.iter().rev().take(limit).cloned().collect())
    }
}
