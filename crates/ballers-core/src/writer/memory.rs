use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use ballers_domain::{CanonicalKey, DomainRecord};
use indexmap::IndexMap;

use super::{RecordStore, SourceLease, UnitOfWork};
use crate::errors::PersistenceError;

/// Backend en memoria con la misma semántica que el de Postgres: unicidad por
/// clave, upsert que conserva `created_at`, commit atómico.
///
/// Es `Clone` (estado compartido) para poder inspeccionarlo mientras un
/// orquestador lo posee. Los clones comparten también las reservas de
/// fuente, como dos procesos sobre la misma base.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    rows: Arc<Mutex<IndexMap<CanonicalKey, DomainRecord>>>,
    rejected: Arc<Mutex<HashSet<CanonicalKey>>>,
    leases: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Precarga filas (sin pasar por una unidad de trabajo).
    pub fn with_records(records: impl IntoIterator<Item = DomainRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut rows) = store.rows.lock() {
            for r in records {
                rows.insert(r.key.clone(), r);
            }
        }
        store
    }

    /// Simula una restricción de la base: cualquier upsert de `key` falla con
    /// `CheckViolation`.
    pub fn reject_key(&self, key: CanonicalKey) {
        if let Ok(mut rejected) = self.rejected.lock() {
            rejected.insert(key);
        }
    }

    /// Copia del contenido confirmado.
    pub fn snapshot(&self) -> IndexMap<CanonicalKey, DomainRecord> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    fn lock_rows(&self) -> Result<MutexGuard<'_, IndexMap<CanonicalKey, DomainRecord>>, PersistenceError> {
        self.rows.lock().map_err(|e| PersistenceError::Unknown(format!("poisoned store: {e}")))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn load_all(&self) -> Result<IndexMap<CanonicalKey, DomainRecord>, PersistenceError> {
        Ok(self.lock_rows()?.clone())
    }

    fn unit_of_work(&self) -> Result<Box<dyn UnitOfWork + '_>, PersistenceError> {
        Ok(Box::new(InMemoryUnitOfWork { store: self, staged: Vec::new(), open: false }))
    }

    fn lock_source(&self, source_key: &str) -> Result<Option<SourceLease<'_>>, PersistenceError> {
        let mut leases = self.leases
                             .lock()
                             .map_err(|e| PersistenceError::Unknown(format!("poisoned store: {e}")))?;
        if !leases.insert(source_key.to_string()) {
            return Ok(None);
        }
        let leases = Arc::clone(&self.leases);
        let key = source_key.to_string();
        Ok(Some(SourceLease::on_release(move || {
                    if let Ok(mut held) = leases.lock() {
                        held.remove(&key);
                    }
                })))
    }
}

#[derive(Debug)]
enum StagedOp {
    Upsert(DomainRecord),
    Deactivate(CanonicalKey),
}

/// Unidad de trabajo en memoria: acumula operaciones y las aplica de una vez
/// en `commit`, con el lock tomado. Nada es visible antes.
pub struct InMemoryUnitOfWork<'a> {
    store: &'a InMemoryRecordStore,
    staged: Vec<StagedOp>,
    open: bool,
}

impl InMemoryUnitOfWork<'_> {
    fn ensure_open(&self) -> Result<(), PersistenceError> {
        if self.open {
            Ok(())
        } else {
            Err(PersistenceError::Unknown("not in transaction".into()))
        }
    }

    fn is_staged_upsert(&self, key: &CanonicalKey) -> bool {
        self.staged.iter().any(|op| matches!(op, StagedOp::Upsert(r) if &r.key == key))
    }
}

impl UnitOfWork for InMemoryUnitOfWork<'_> {
    fn begin(&mut self) -> Result<(), PersistenceError> {
        if self.open {
            return Err(PersistenceError::Unknown("already in transaction".into()));
        }
        self.staged.clear();
        self.open = true;
        Ok(())
    }

    fn upsert(&mut self, record: &DomainRecord) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        let rejected = self.store
                           .rejected
                           .lock()
                           .map_err(|e| PersistenceError::Unknown(format!("poisoned store: {e}")))?
                           .contains(&record.key);
        if rejected {
            return Err(PersistenceError::CheckViolation(format!("canonical_key rejected: {}", record.key)));
        }
        self.staged.push(StagedOp::Upsert(record.clone()));
        Ok(())
    }

    fn deactivate(&mut self, key: &CanonicalKey) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        let exists = self.store.lock_rows()?.contains_key(key) || self.is_staged_upsert(key);
        if !exists {
            return Err(PersistenceError::NotFound(key.to_string()));
        }
        self.staged.push(StagedOp::Deactivate(key.clone()));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        let mut rows = self.store.lock_rows()?;
        for op in self.staged.drain(..) {
            match op {
                StagedOp::Upsert(mut record) => {
                    if let Some(current) = rows.get(&record.key) {
                        record.created_at = current.created_at;
                    }
                    rows.insert(record.key.clone(), record);
                }
                StagedOp::Deactivate(key) => {
                    if let Some(current) = rows.get_mut(&key) {
                        current.active = false;
                    }
                }
            }
        }
        self.open = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), PersistenceError> {
        self.staged.clear();
        self.open = false;
        Ok(())
    }
}
