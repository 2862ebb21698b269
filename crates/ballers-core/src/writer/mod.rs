//! Escritura transaccional de decisiones.
//!
//! El writer no conoce ningún backend: sólo requiere una "unidad de trabajo"
//! (`begin/upsert/deactivate/commit/rollback`) sobre registros indexados por
//! `CanonicalKey` con restricción de unicidad.
//!
//! Política todo-o-nada: ante cualquier error se hace rollback y el lote no
//! deja rastro. Las corridas son idempotentes, así que reintentar desde cero
//! es seguro.

mod memory;

use std::collections::HashSet;

use ballers_domain::{CanonicalKey, DomainRecord};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, error, warn};

use crate::errors::PersistenceError;
use crate::reconcile::ReconciliationDecision;

pub use memory::{InMemoryRecordStore, InMemoryUnitOfWork};

/// Transacción abierta sobre la tabla de registros.
pub trait UnitOfWork {
    fn begin(&mut self) -> Result<(), PersistenceError>;
    /// Inserta o actualiza por `CanonicalKey`. En conflicto se conserva
    /// `created_at` del registro almacenado.
    fn upsert(&mut self, record: &DomainRecord) -> Result<(), PersistenceError>;
    /// Soft-delete: `active = false`, la fila sigue existiendo.
    fn deactivate(&mut self, key: &CanonicalKey) -> Result<(), PersistenceError>;
    fn commit(&mut self) -> Result<(), PersistenceError>;
    fn rollback(&mut self) -> Result<(), PersistenceError>;
}

/// Reserva exclusiva de una fuente frente a otros procesos que comparten el
/// almacén. Se libera al soltarla.
pub struct SourceLease<'a> {
    release: Option<Box<dyn FnOnce() + Send + 'a>>,
}

impl<'a> SourceLease<'a> {
    /// Reserva sin efecto, para almacenes que no se comparten entre procesos.
    pub fn unguarded() -> Self {
        Self { release: None }
    }

    /// Reserva que ejecuta `release` al soltarse.
    pub fn on_release(release: impl FnOnce() + Send + 'a) -> Self {
        Self { release: Some(Box::new(release)) }
    }
}

impl Drop for SourceLease<'_> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for SourceLease<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceLease").field("guarded", &self.release.is_some()).finish()
    }
}

/// Acceso a los registros persistidos.
pub trait RecordStore {
    /// Todos los registros (activos e inactivos) en orden estable.
    fn load_all(&self) -> Result<IndexMap<CanonicalKey, DomainRecord>, PersistenceError>;
    /// Abre una unidad de trabajo exclusiva para un `apply`.
    fn unit_of_work(&self) -> Result<Box<dyn UnitOfWork + '_>, PersistenceError>;
    /// Reserva `source_key` durante toda una corrida. `Ok(None)` si otro
    /// proceso ya la tiene.
    fn lock_source(&self, _source_key: &str) -> Result<Option<SourceLease<'_>>, PersistenceError> {
        Ok(Some(SourceLease::unguarded()))
    }
}

impl<T: RecordStore + ?Sized> RecordStore for std::sync::Arc<T> {
    fn load_all(&self) -> Result<IndexMap<CanonicalKey, DomainRecord>, PersistenceError> {
        (**self).load_all()
    }

    fn unit_of_work(&self) -> Result<Box<dyn UnitOfWork + '_>, PersistenceError> {
        (**self).unit_of_work()
    }

    fn lock_source(&self, source_key: &str) -> Result<Option<SourceLease<'_>>, PersistenceError> {
        (**self).lock_source(source_key)
    }
}

/// Aplica lotes de decisiones como una única transacción.
pub struct PersistenceWriter<'a, St: RecordStore + ?Sized> {
    store: &'a St,
}

impl<'a, St: RecordStore + ?Sized> PersistenceWriter<'a, St> {
    pub fn new(store: &'a St) -> Self {
        Self { store }
    }

    /// Escribe el lote y devuelve cuántas filas cambiaron realmente.
    ///
    /// - Insert / Update → upsert.
    /// - Orphan → `deactivate` sólo si el registro seguía activo.
    /// - Unchanged → sin escritura.
    ///
    /// Dos decisiones para la misma clave en un lote violan la unicidad y
    /// abortan todo el lote.
    pub fn apply(&self, decisions: &[ReconciliationDecision], now: DateTime<Utc>) -> Result<usize, PersistenceError> {
        debug!("apply:start decisions={}", decisions.len());
        let mut uow = self.store.unit_of_work()?;
        uow.begin()?;
        let written = match write_all(uow.as_mut(), decisions, now) {
            Ok(n) => n,
            Err(e) => {
                error!("apply:write failed, rolling back err={e}");
                if let Err(rb) = uow.rollback() {
                    warn!("apply:rollback failed err={rb}");
                }
                return Err(e);
            }
        };
        if let Err(e) = uow.commit() {
            error!("apply:commit failed err={e}");
            if let Err(rb) = uow.rollback() {
                warn!("apply:rollback after commit failure err={rb}");
            }
            return Err(e);
        }
        debug!("apply:done written={written}");
        Ok(written)
    }
}

fn write_all<U: UnitOfWork + ?Sized>(uow: &mut U,
                                      decisions: &[ReconciliationDecision],
                                      now: DateTime<Utc>)
                                      -> Result<usize, PersistenceError> {
    let mut seen: HashSet<&CanonicalKey> = HashSet::with_capacity(decisions.len());
    let mut written = 0;
    for decision in decisions {
        let key = decision.key();
        if !seen.insert(key) {
            return Err(PersistenceError::UniqueViolation(format!("duplicate canonical_key in batch: {key}")));
        }
        match decision {
            ReconciliationDecision::Insert { key, label, attributes, .. } => {
                uow.upsert(&DomainRecord::new(key.clone(), label.clone(), attributes.clone(), now))?;
                written += 1;
            }
            ReconciliationDecision::Update { existing, attributes, .. } => {
                uow.upsert(&existing.updated_with(attributes.clone(), now))?;
                written += 1;
            }
            ReconciliationDecision::Orphan { existing } if existing.active => {
                uow.deactivate(&existing.key)?;
                written += 1;
            }
            ReconciliationDecision::Orphan { .. } | ReconciliationDecision::Unchanged { .. } => {}
        }
    }
    Ok(written)
}
