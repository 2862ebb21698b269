use std::collections::BTreeMap;

use ballers_core::{PersistenceError, RecordStore, SourceLease, UnitOfWork};
use ballers_domain::{CanonicalKey, DomainRecord};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Bool, Text};
use diesel::upsert::excluded;
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;

use super::{with_retry, ConnectionProvider};
use crate::error::from_diesel;
use crate::schema::domain_records;

/// Fila de `domain_records` (mismo orden de columnas que la tabla).
#[derive(Queryable, Debug)]
pub(crate) struct RecordRow {
    pub canonical_key: String,
    pub label: String,
    pub attributes: Value,
    pub sync_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = domain_records)]
pub(crate) struct NewRecordRow<'a> {
    pub canonical_key: &'a str,
    pub label: &'a str,
    pub attributes: Value,
    pub sync_hash: &'a str,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl<'a> NewRecordRow<'a> {
    pub(crate) fn from_record(record: &'a DomainRecord) -> Result<Self, PersistenceError> {
        let attributes = serde_json::to_value(&record.attributes)
            .map_err(|e| PersistenceError::Unknown(format!("serialize attributes: {e}")))?;
        Ok(Self { canonical_key: record.key.as_str(),
                  label: &record.label,
                  attributes,
                  sync_hash: &record.sync_hash,
                  active: record.active,
                  created_at: record.created_at,
                  last_synced_at: record.last_synced_at })
    }
}

/// Reconstruye un `DomainRecord`. Una clave no canónica en la tabla indica
/// escritura externa y se reporta como error.
pub(crate) fn record_from_row(row: RecordRow) -> Result<DomainRecord, PersistenceError> {
    let key = CanonicalKey::from_stored(&row.canonical_key)
        .map_err(|e| PersistenceError::Unknown(format!("stored key {:?}: {e}", row.canonical_key)))?;
    let attributes: BTreeMap<String, String> = serde_json::from_value(row.attributes)
        .map_err(|e| PersistenceError::Unknown(format!("attributes of {key}: {e}")))?;
    Ok(DomainRecord { key,
                      label: row.label,
                      attributes,
                      sync_hash: row.sync_hash,
                      created_at: row.created_at,
                      last_synced_at: row.last_synced_at,
                      active: row.active })
}

#[derive(QueryableByName, Debug)]
struct AdvisoryLock {
    #[diesel(sql_type = Bool)]
    locked: bool,
}

/// `RecordStore` sobre la tabla `domain_records`.
///
/// `lock_source` toma un advisory lock de sesión (`hashtext(source_key)`) en
/// una conexión que queda fuera del pool hasta soltar la reserva; la corrida
/// usa además otra conexión, así que el pool necesita al menos dos.
pub struct PgRecordStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgRecordStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: ConnectionProvider> RecordStore for PgRecordStore<P> {
    fn load_all(&self) -> Result<IndexMap<CanonicalKey, DomainRecord>, PersistenceError> {
        debug!("load_all:start");
        let rows: Vec<RecordRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            domain_records::table.order((domain_records::created_at.asc(), domain_records::canonical_key.asc()))
                                 .load(&mut conn)
                                 .map_err(from_diesel)
        })?;
        let mut out = IndexMap::with_capacity(rows.len());
        for row in rows {
            let record = record_from_row(row)?;
            out.insert(record.key.clone(), record);
        }
        debug!("load_all:done count={}", out.len());
        Ok(out)
    }

    fn unit_of_work(&self) -> Result<Box<dyn UnitOfWork + '_>, PersistenceError> {
        Ok(Box::new(PgUnitOfWork { provider: &self.provider, staged: Vec::new(), open: false }))
    }

    fn lock_source(&self, source_key: &str) -> Result<Option<SourceLease<'_>>, PersistenceError> {
        let mut conn = self.provider.connection()?;
        let acquired: AdvisoryLock = diesel::sql_query("SELECT pg_try_advisory_lock(hashtext($1)) AS locked")
            .bind::<Text, _>(source_key)
            .get_result(&mut conn)
            .map_err(from_diesel)?;
        if !acquired.locked {
            debug!("lock_source:busy key={source_key}");
            return Ok(None);
        }
        debug!("lock_source:acquired key={source_key}");
        let key = source_key.to_string();
        Ok(Some(SourceLease::on_release(move || {
                    let released = diesel::sql_query("SELECT pg_advisory_unlock(hashtext($1)) AS locked")
                        .bind::<Text, _>(&key)
                        .get_result::<AdvisoryLock>(&mut conn);
                    match released {
                        Ok(AdvisoryLock { locked: true }) => debug!("lock_source:released key={key}"),
                        Ok(_) => warn!("lock_source:release found no lock key={key}"),
                        Err(e) => warn!("lock_source:release failed key={key} err={e}"),
                    }
                })))
    }
}

#[derive(Debug)]
enum StagedOp {
    Upsert(DomainRecord),
    Deactivate(CanonicalKey),
}

/// Unidad de trabajo Postgres: acumula operaciones y las ejecuta en una sola
/// transacción `read_write` al confirmar. `rollback` descarta lo acumulado;
/// nada toca la base antes de `commit`.
pub struct PgUnitOfWork<'a, P: ConnectionProvider> {
    provider: &'a P,
    staged: Vec<StagedOp>,
    open: bool,
}

impl<P: ConnectionProvider> PgUnitOfWork<'_, P> {
    fn ensure_open(&self) -> Result<(), PersistenceError> {
        if self.open {
            Ok(())
        } else {
            Err(PersistenceError::Unknown("unit of work not started".into()))
        }
    }

    fn execute_staged(&self, conn: &mut PgConnection) -> Result<(), diesel::result::Error> {
        conn.build_transaction().read_write().run(|tx| {
                                                 for op in &self.staged {
                                                     match op {
                                                         StagedOp::Upsert(record) => upsert_row(tx, record)?,
                                                         StagedOp::Deactivate(key) => deactivate_row(tx, key)?,
                                                     }
                                                 }
                                                 Ok(())
                                             })
    }
}

fn upsert_row(tx: &mut PgConnection, record: &DomainRecord) -> Result<(), diesel::result::Error> {
    let row = NewRecordRow::from_record(record).map_err(|e| diesel::result::Error::SerializationError(Box::new(e)))?;
    // En conflicto se conserva created_at.
    diesel::insert_into(domain_records::table).values(&row)
                                              .on_conflict(domain_records::canonical_key)
                                              .do_update()
                                              .set((domain_records::label.eq(excluded(domain_records::label)),
                                                    domain_records::attributes.eq(excluded(domain_records::attributes)),
                                                    domain_records::sync_hash.eq(excluded(domain_records::sync_hash)),
                                                    domain_records::active.eq(excluded(domain_records::active)),
                                                    domain_records::last_synced_at.eq(excluded(domain_records::last_synced_at))))
                                              .execute(tx)?;
    Ok(())
}

fn deactivate_row(tx: &mut PgConnection, key: &CanonicalKey) -> Result<(), diesel::result::Error> {
    let updated = diesel::update(domain_records::table.filter(domain_records::canonical_key.eq(key.as_str())))
        .set(domain_records::active.eq(false))
        .execute(tx)?;
    if updated == 0 {
        return Err(diesel::result::Error::NotFound);
    }
    Ok(())
}

impl<P: ConnectionProvider> UnitOfWork for PgUnitOfWork<'_, P> {
    fn begin(&mut self) -> Result<(), PersistenceError> {
        self.staged.clear();
        self.open = true;
        Ok(())
    }

    fn upsert(&mut self, record: &DomainRecord) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        self.staged.push(StagedOp::Upsert(record.clone()));
        Ok(())
    }

    fn deactivate(&mut self, key: &CanonicalKey) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        self.staged.push(StagedOp::Deactivate(key.clone()));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        debug!("commit:start ops={}", self.staged.len());
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            self.execute_staged(&mut conn).map_err(from_diesel)
        })?;
        debug!("commit:done ops={}", self.staged.len());
        self.staged.clear();
        self.open = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), PersistenceError> {
        debug!("rollback ops={}", self.staged.len());
        self.staged.clear();
        self.open = false;
        Ok(())
    }
}
