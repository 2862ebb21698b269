//! Reserva de fuente entre procesos vía advisory locks (requiere DATABASE_URL).

mod test_support;

use ballers_core::{Page, PageCursor, PageSource, RecordStore, RunRegistry, SheetReader, SourceError, SourceRef,
                   SyncOrchestrator};
use ballers_domain::SheetSchema;
use ballers_persistence::PgRecordStore;
use test_support::{provider, unique_name, with_pool};

struct FixedSource(Vec<Vec<String>>);

impl PageSource for FixedSource {
    fn fetch_page(&self, _source: &SourceRef, _cursor: Option<&PageCursor>) -> Result<Page, SourceError> {
        Ok(Page { rows: self.0.clone(), next: None })
    }
}

#[test]
fn leased_source_blocks_runs_from_other_sessions() {
    with_pool(|pool| {
        let source = SourceRef::new(unique_name("sheet"), "Hoja 1!A:B");
        // Otro proceso: almacén y registro propios, misma base.
        let other_process = PgRecordStore::new(provider(pool));
        let lease = other_process.lock_source(&source.lock_key()).unwrap().expect("free source");

        let rows = vec![vec!["Nombre".to_string(), "Servicio".to_string()],
                        vec![unique_name("Ana García"), "Mensual".to_string()]];
        let schema = SheetSchema::new(["Nombre"], ["Servicio"]).unwrap();
        let orch = SyncOrchestrator::new(SheetReader::new(FixedSource(rows), schema), PgRecordStore::new(provider(pool)))
            .with_registry(RunRegistry::new());
        assert!(orch.store().lock_source(&source.lock_key()).unwrap().is_none());

        let busy = orch.run(&source).expect_err("source is leased by another session");
        assert_eq!(busy.source_key, source.lock_key());

        drop(lease);
        let report = orch.run(&source).expect("lease released");
        assert!(report.is_success(), "errors: {:?}", report.errors());
        assert_eq!(report.counts().insert, 1);
    });
}
