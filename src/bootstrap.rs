//! Armado del pipeline de producción: Google Sheets → Postgres.

use std::sync::Arc;

use ballers_adapters::{GoogleSheetsSource, SheetsClientConfig};
use ballers_core::{AutoSync, RunLog, SheetReader, SyncOrchestrator};
use ballers_persistence::{build_pool_from_config, PgRecordStore, PgRunLog, PoolProvider};
use log::info;

use crate::config::SyncConfig;
use crate::errors::AppError;

pub type SheetsOrchestrator = SyncOrchestrator<GoogleSheetsSource, PgRecordStore<PoolProvider>>;
pub type SheetsAutoSync = AutoSync<GoogleSheetsSource, PgRecordStore<PoolProvider>>;

/// Aplicación armada: orquestador compartible y acceso al historial.
pub struct App {
    pub config: SyncConfig,
    pub orchestrator: Arc<SheetsOrchestrator>,
    pub run_log: Arc<PgRunLog<PoolProvider>>,
}

impl App {
    /// Auto-sync sobre el orquestador de la aplicación. No arranca hasta
    /// llamar a `start`.
    pub fn auto_sync(&self) -> SheetsAutoSync {
        AutoSync::new(Arc::clone(&self.orchestrator), self.config.source.clone())
    }
}

/// Construye pool (con migraciones), cliente de Sheets, lector, almacén y
/// orquestador a partir de la configuración.
pub fn bootstrap(config: SyncConfig) -> Result<App, AppError> {
    let schema = config.schema()?;
    let pool = build_pool_from_config(&config.database)?;
    let provider = PoolProvider { pool };

    let sheets = GoogleSheetsSource::new(config.credential.clone(),
                                         SheetsClientConfig { page_size: config.page_size, ..SheetsClientConfig::default() })?;
    let reader = SheetReader::new(sheets, schema).with_retry(config.retry);
    let store = PgRecordStore::new(provider.clone());
    let run_log = Arc::new(PgRunLog::new(provider));
    let orchestrator = SyncOrchestrator::new(reader, store).with_run_log(Arc::clone(&run_log) as Arc<dyn RunLog>);

    info!("bootstrap:ready source={} page_size={} max_attempts={}",
          config.source,
          config.page_size,
          config.retry.max_attempts);
    Ok(App { config, orchestrator: Arc::new(orchestrator), run_log })
}
