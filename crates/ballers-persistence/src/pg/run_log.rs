use ballers_core::{PersistenceError, RunLog, SyncReport};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;
use serde_json::Value;
use uuid::Uuid;

use super::{with_retry, ConnectionProvider};
use crate::error::from_diesel;
use crate::schema::sync_runs;

#[derive(Insertable, Debug)]
#[diesel(table_name = sync_runs)]
pub(crate) struct NewRunRow<'a> {
    pub run_id: Uuid,
    pub source: &'a str,
    pub state: &'static str,
    pub counts: Value,
    pub applied: i64,
    pub errors: Value,
    pub warnings: Value,
    pub report: Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

fn to_json<T: serde::Serialize>(what: &str, value: &T) -> Result<Value, PersistenceError> {
    serde_json::to_value(value).map_err(|e| PersistenceError::Unknown(format!("serialize {what}: {e}")))
}

impl<'a> NewRunRow<'a> {
    pub(crate) fn from_report(report: &'a SyncReport) -> Result<Self, PersistenceError> {
        Ok(Self { run_id: report.run_id(),
                  source: report.source(),
                  state: report.state().as_str(),
                  counts: to_json("counts", &report.counts())?,
                  applied: report.applied() as i64,
                  errors: to_json("errors", &report.errors())?,
                  warnings: to_json("warnings", &report.warnings())?,
                  report: to_json("report", report)?,
                  started_at: report.started_at(),
                  finished_at: report.finished_at() })
    }
}

/// Historial de corridas en `sync_runs`. Registrar dos veces el mismo
/// `run_id` no duplica la fila.
pub struct PgRunLog<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgRunLog<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> RunLog for PgRunLog<P> {
    fn record(&self, report: &SyncReport) -> Result<(), PersistenceError> {
        let row = NewRunRow::from_report(report)?;
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(sync_runs::table).values(&row)
                                                 .on_conflict_do_nothing()
                                                 .execute(&mut conn)
                                                 .map_err(from_diesel)
        })?;
        debug!("run_log:recorded run={} state={}", row.run_id, row.state);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<SyncReport>, PersistenceError> {
        let payloads: Vec<Value> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            sync_runs::table.select(sync_runs::report)
                            .order(sync_runs::started_at.desc())
                            .limit(limit as i64)
                            .load(&mut conn)
                            .map_err(from_diesel)
        })?;
        payloads.into_iter()
                .map(|v| serde_json::from_value(v).map_err(|e| PersistenceError::Unknown(format!("deser report: {e}"))))
                .collect()
    }
}
