use ballers_domain::{normalize, normalize_parts, DomainRecord, ExternalRecord, SheetSchema};
use chrono::Utc;

#[test]
fn test_same_name_variants_share_key() {
    // Variantes que una persona considera el mismo nombre
    let variants = ["Ana García", "ana garcia", "  ANA   GARCÍA ", "Ana\u{00A0}Garci\u{0301}a", "Ａｎａ Ｇａｒｃíａ"];
    let keys: Vec<_> = variants.iter().map(|v| normalize(v).unwrap()).collect();
    for k in &keys {
        assert_eq!(k, &keys[0], "variante distinta: {k}");
    }
    assert_eq!(normalize("STRAẞE").unwrap(), normalize("Straße").unwrap());
    assert_eq!(normalize("Strasse").unwrap(), normalize("straße").unwrap());
}

#[test]
fn test_different_names_do_not_collide() {
    assert_ne!(normalize("Luis Pérez").unwrap(), normalize("Luisa Pérez").unwrap());
    assert_ne!(normalize_parts(&["Ana", "García"]).unwrap(), normalize_parts(&["Ana", "Gracia"]).unwrap());
}

#[test]
fn test_schema_extracts_label_and_attributes() {
    let schema = SheetSchema::new(["Nombre", "Apellido"], ["Servicio"]).unwrap();
    let header: Vec<String> = ["Nombre", "Apellido", "Servicio"].iter().map(|s| s.to_string()).collect();
    let cells: Vec<String> = ["Ana", " García ", " Elite"].iter().map(|s| s.to_string()).collect();
    let row = ExternalRecord::from_cells(2, &header, &cells);
    assert_eq!(schema.label_of(&row), "Ana García");
    let key = normalize_parts(&schema.key_values(&row)).unwrap();
    assert_eq!(key.as_str(), "ana garcia");
    let attrs = schema.attributes_of(&row);
    assert_eq!(attrs.get("Servicio").map(String::as_str), Some("Elite"));

    let rec = DomainRecord::new(key, schema.label_of(&row), attrs.clone(), Utc::now());
    assert!(rec.active);
    assert!(rec.diff(&attrs).is_empty());
}
