//! Auto-sync: ejecuta el orquestador cada cierto intervalo en un hilo de
//! fondo y mantiene estadísticas para la capa de presentación.
//!
//! - `start` / `stop` son idempotentes (devuelven `false` si no hubo cambio).
//! - `stop` interrumpe la espera entre corridas; una corrida en curso termina
//!   normalmente antes de que el hilo salga.
//! - Los cambios detectados quedan pendientes de notificar hasta que alguien
//!   llama a `take_pending_changes`.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::RunInProgress;
use crate::orchestrator::{ChangeSummary, SyncOrchestrator, SyncReport};
use crate::source::{PageSource, SourceRef};
use crate::writer::RecordStore;

/// Estadísticas acumuladas del auto-sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoSyncStats {
    pub running: bool,
    pub interval: Duration,
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_duration: Option<Duration>,
    pub last_error: Option<String>,
    pub last_changes: Option<ChangeSummary>,
    pub last_changes_at: Option<DateTime<Utc>>,
    /// `false` mientras haya cambios sin notificar.
    pub changes_notified: bool,
}

#[derive(Default)]
struct Shared {
    stats: Mutex<AutoSyncStats>,
    stop_requested: Mutex<bool>,
    wake: Condvar,
}

impl Shared {
    fn stats(&self) -> MutexGuard<'_, AutoSyncStats> {
        // Las estadísticas son informativas: un lock envenenado se recupera.
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, outcome: &Result<SyncReport, RunInProgress>, elapsed: Duration) {
        let mut stats = self.stats();
        stats.total_syncs += 1;
        stats.last_duration = Some(elapsed);
        match outcome {
            Ok(report) if report.is_success() => {
                stats.successful_syncs += 1;
                stats.last_sync_at = Some(report.finished_at());
                stats.last_error = None;
                let changes = report.change_summary();
                if !changes.is_empty() {
                    stats.last_changes = Some(changes);
                    stats.last_changes_at = Some(report.finished_at());
                    stats.changes_notified = false;
                }
            }
            Ok(report) => {
                stats.failed_syncs += 1;
                stats.last_error = report.errors().first().map(|e| e.to_string());
            }
            Err(busy) => {
                stats.failed_syncs += 1;
                stats.last_error = Some(busy.to_string());
            }
        }
    }
}

pub struct AutoSync<S, St>
    where S: PageSource + Send + Sync + 'static,
          St: RecordStore + Send + Sync + 'static
{
    orchestrator: Arc<SyncOrchestrator<S, St>>,
    source: SourceRef,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S, St> AutoSync<S, St>
    where S: PageSource + Send + Sync + 'static,
          St: RecordStore + Send + Sync + 'static
{
    pub fn new(orchestrator: Arc<SyncOrchestrator<S, St>>, source: SourceRef) -> Self {
        let shared = Arc::new(Shared::default());
        shared.stats().changes_notified = true;
        Self { orchestrator, source, shared, worker: Mutex::new(None) }
    }

    /// Arranca el hilo de fondo. La primera corrida es inmediata.
    pub fn start(&self, interval: Duration) -> bool {
        let mut worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
        if worker.is_some() {
            return false;
        }
        *self.shared.stop_requested.lock().unwrap_or_else(|p| p.into_inner()) = false;
        {
            let mut stats = self.shared.stats();
            stats.running = true;
            stats.interval = interval;
        }
        let orchestrator = Arc::clone(&self.orchestrator);
        let shared = Arc::clone(&self.shared);
        let source = self.source.clone();
        info!("auto_sync:start source={source} interval_s={}", interval.as_secs());
        *worker = Some(std::thread::spawn(move || loop_until_stopped(&orchestrator, &shared, &source, interval)));
        true
    }

    /// Detiene el hilo y espera a que termine.
    pub fn stop(&self) -> bool {
        let handle = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take();
        let Some(handle) = handle else {
            return false;
        };
        *self.shared.stop_requested.lock().unwrap_or_else(|p| p.into_inner()) = true;
        self.shared.wake.notify_all();
        if handle.join().is_err() {
            warn!("auto_sync:worker panicked source={}", self.source);
        }
        self.shared.stats().running = false;
        info!("auto_sync:stopped source={}", self.source);
        true
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().map(|w| w.is_some()).unwrap_or(false)
    }

    /// Corrida manual inmediata, contabilizada en las estadísticas.
    pub fn force_sync(&self) -> Result<SyncReport, RunInProgress> {
        run_and_record(&self.orchestrator, &self.shared, &self.source)
    }

    pub fn status(&self) -> AutoSyncStats {
        self.shared.stats().clone()
    }

    /// Devuelve los cambios pendientes de notificar una única vez.
    pub fn take_pending_changes(&self) -> Option<ChangeSummary> {
        let mut stats = self.shared.stats();
        if stats.changes_notified {
            return None;
        }
        stats.changes_notified = true;
        stats.last_changes
    }
}

impl<S, St> Drop for AutoSync<S, St>
    where S: PageSource + Send + Sync + 'static,
          St: RecordStore + Send + Sync + 'static
{
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_and_record<S, St>(orchestrator: &SyncOrchestrator<S, St>,
                         shared: &Shared,
                         source: &SourceRef)
                         -> Result<SyncReport, RunInProgress>
    where S: PageSource,
          St: RecordStore
{
    let started = Instant::now();
    let outcome = orchestrator.run(source);
    shared.record(&outcome, started.elapsed());
    outcome
}

fn loop_until_stopped<S, St>(orchestrator: &SyncOrchestrator<S, St>, shared: &Shared, source: &SourceRef, interval: Duration)
    where S: PageSource,
          St: RecordStore
{
    loop {
        match run_and_record(orchestrator, shared, source) {
            Ok(report) => {
                if let Some(msg) = report.change_summary().message() {
                    info!("auto_sync:changes source={source} {msg}");
                }
            }
            Err(busy) => warn!("auto_sync:skipped {busy}"),
        }
        let stop = shared.stop_requested.lock().unwrap_or_else(|p| p.into_inner());
        let (stop, _) = shared.wake
                              .wait_timeout_while(stop, interval, |stop| !*stop)
                              .unwrap_or_else(|p| p.into_inner());
        if *stop {
            return;
        }
    }
}
