//! Corrida completa del orquestador contra Postgres (requiere DATABASE_URL).

mod test_support;

use std::sync::Arc;

use ballers_core::{Page, PageCursor, PageSource, RecordStore, RunLog, RunRegistry, SheetReader, SourceError, SourceRef,
                   SyncOrchestrator};
use ballers_domain::{normalize, SheetSchema};
use ballers_persistence::{PgRecordStore, PgRunLog};
use test_support::{provider, unique_name, with_pool};

struct FixedSource(Vec<Vec<String>>);

impl PageSource for FixedSource {
    fn fetch_page(&self, _source: &SourceRef, _cursor: Option<&PageCursor>) -> Result<Page, SourceError> {
        Ok(Page { rows: self.0.clone(), next: None })
    }
}

#[test]
fn run_against_postgres_is_idempotent() {
    with_pool(|pool| {
        let ana = unique_name("Ana García");
        let luis = unique_name("Luis Pérez");
        let rows = vec![vec!["Nombre".to_string(), "Servicio".to_string()],
                        vec![ana.clone(), "Mensual".to_string()],
                        vec![luis.clone(), "Anual".to_string()]];
        let schema = SheetSchema::new(["Nombre"], ["Servicio"]).unwrap();
        let run_log = Arc::new(PgRunLog::new(provider(pool)));
        let orch = SyncOrchestrator::new(SheetReader::new(FixedSource(rows), schema), PgRecordStore::new(provider(pool)))
            .with_registry(RunRegistry::new())
            .with_run_log(run_log.clone());
        let source = SourceRef::new(unique_name("sheet"), "Hoja 1!A:B");

        let first = orch.run(&source).unwrap();
        assert!(first.is_success(), "errors: {:?}", first.errors());
        assert_eq!(first.counts().insert, 2);

        let second = orch.run(&source).unwrap();
        assert!(second.is_success());
        assert_eq!(second.counts().insert, 0);
        assert_eq!(second.counts().update, 0);
        assert_eq!(second.counts().unchanged, 2);

        let stored = orch.store().load_all().unwrap();
        assert!(stored[&normalize(&ana).unwrap()].active);
        assert!(stored[&normalize(&luis).unwrap()].active);

        let recent = run_log.recent(2).unwrap();
        assert!(recent.iter().any(|r| r.run_id() == second.run_id()));
    });
}
