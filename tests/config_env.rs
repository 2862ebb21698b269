use std::collections::HashMap;
use std::time::Duration;

use ballers_sync::{ConfigError, SyncConfig};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k| map.get(k).cloned()
}

const BASE: [(&str, &str); 3] = [("BALLERS_SHEET_ID", "1AbC"),
                                 ("GOOGLE_ACCESS_TOKEN", "ya29.secret"),
                                 ("DATABASE_URL", "postgres://u:p@localhost/ballers")];

#[test]
fn defaults_follow_the_accounting_sheet() {
    let cfg = SyncConfig::from_lookup(lookup(&BASE)).unwrap();
    assert_eq!(cfg.source.range, "Hoja 1!A:G");
    assert_eq!(cfg.key_columns, vec!["Nombre"]);
    assert_eq!(cfg.page_size, 500);
    assert_eq!(cfg.retry.max_attempts, 4);
    assert_eq!(cfg.retry.base_delay, Duration::from_millis(200));
    assert_eq!(cfg.sync_interval, Duration::from_secs(300));
    assert_eq!(cfg.database.max_connections, 16);
}

#[test]
fn columns_and_numbers_are_parsed() {
    let mut pairs = BASE.to_vec();
    pairs.extend([("BALLERS_KEY_COLUMNS", "Nombre, Apellido"),
                  ("BALLERS_ATTRIBUTE_COLUMNS", "Concepto,Ingresos,Gastos"),
                  ("BALLERS_NUMERIC_COLUMNS", "Ingresos,Gastos"),
                  ("BALLERS_PAGE_SIZE", "250"),
                  ("BALLERS_SYNC_INTERVAL_MINUTES", "15")]);
    let cfg = SyncConfig::from_lookup(lookup(&pairs)).unwrap();
    let schema = cfg.schema().unwrap();
    assert_eq!(schema.key_columns(), ["Nombre".to_string(), "Apellido".to_string()]);
    assert_eq!(schema.normalize_value("Gastos", "abc"), "0");
    assert_eq!(cfg.page_size, 250);
    assert_eq!(cfg.sync_interval, Duration::from_secs(900));
}

#[test]
fn required_and_invalid_values_are_reported() {
    let err = SyncConfig::from_lookup(lookup(&BASE[1..])).unwrap_err();
    assert_eq!(err, ConfigError::Missing("BALLERS_SHEET_ID"));

    let mut pairs = BASE.to_vec();
    pairs.push(("BALLERS_PAGE_SIZE", "0"));
    assert!(matches!(SyncConfig::from_lookup(lookup(&pairs)),
                     Err(ConfigError::Invalid { name: "BALLERS_PAGE_SIZE", .. })));

    let mut pairs = BASE.to_vec();
    pairs.push(("BALLERS_SYNC_INTERVAL_MINUTES", "18446744073709551615"));
    assert!(matches!(SyncConfig::from_lookup(lookup(&pairs)),
                     Err(ConfigError::Invalid { name: "BALLERS_SYNC_INTERVAL_MINUTES", .. })),
            "minutes that overflow seconds are rejected, not wrapped");

    let mut pairs = BASE.to_vec();
    pairs.push(("BALLERS_NUMERIC_COLUMNS", "Ingresos"));
    assert!(matches!(SyncConfig::from_lookup(lookup(&pairs)), Err(ConfigError::Schema(_))),
            "numeric columns must be attribute columns");

    let no_db: Vec<_> = BASE.iter().copied().filter(|(k, _)| *k != "DATABASE_URL").collect();
    assert!(matches!(SyncConfig::from_lookup(lookup(&no_db)), Err(ConfigError::Database(_))));
}

#[test]
fn summary_never_exposes_secrets() {
    let cfg = SyncConfig::from_lookup(lookup(&BASE)).unwrap();
    let summary = cfg.summary();
    assert!(summary.credential_present);
    assert_eq!(summary.database_host, "localhost");
    let printed = format!("{summary:?} {cfg:?}");
    assert!(!printed.contains("ya29.secret"));
}
