//! ballers-core: pipeline de sincronización hoja de cálculo → base relacional.
//!
//! Módulos (de las hojas hacia arriba):
//! - `source`: lectura paginada con reintentos y validación de cabecera.
//! - `reconcile`: clasificación de filas en Insert / Update / Unchanged / Orphan.
//! - `writer`: aplicación transaccional de decisiones sobre un `RecordStore`.
//! - `orchestrator`: máquina de estados de la corrida y `SyncReport`.
//! - `schedule`: auto-sync periódico sobre el orquestador.
pub mod constants;
pub mod errors;
pub mod orchestrator;
pub mod reconcile;
pub mod schedule;
pub mod source;
pub mod writer;

pub use errors::{classify_failure, ErrorClass, PersistenceError, RunInProgress, SourceError, SyncFailure, SyncWarning};
pub use orchestrator::{ChangeSummary, InMemoryRunLog, RunLog, RunRegistry, SyncOrchestrator, SyncReport, SyncState};
pub use reconcile::{reconcile, DecisionCounts, DecisionKind, Reconciliation, ReconciliationDecision};
pub use schedule::{AutoSync, AutoSyncStats};
pub use source::{CancellationToken, Page, PageCursor, PageSource, RetryPolicy, SheetReader, SheetRows, SourceCredential, SourceRef};
pub use writer::{InMemoryRecordStore, PersistenceWriter, RecordStore, SourceLease, UnitOfWork};
