//! `GoogleSheetsSource` contra un servidor HTTP local con respuestas
//! guionadas.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::mpsc::{channel, Receiver};
use std::thread;
use std::time::Duration;

use ballers_adapters::{GoogleSheetsSource, SheetsClientConfig};
use ballers_core::{PageCursor, PageSource, RetryPolicy, SheetReader, SourceCredential, SourceError, SourceRef};
use ballers_domain::SheetSchema;

struct Seen {
    request_line: String,
    authorization: Option<String>,
}

/// Sirve `responses` (estado, cuerpo) en orden, una por conexión.
fn serve(responses: Vec<(u16, String)>) -> (String, Receiver<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = channel();
    thread::spawn(move || {
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut authorization = None;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("authorization") {
                        authorization = Some(value.trim().to_string());
                    }
                }
            }
            let _ = tx.send(Seen { request_line: request_line.trim().to_string(), authorization });
            let response = format!("HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                                   body.len());
            stream.write_all(response.as_bytes()).unwrap();
        }
    });
    (base, rx)
}

fn source(base: String, page_size: usize) -> GoogleSheetsSource {
    let config = SheetsClientConfig { base_url: base, page_size, timeout: Duration::from_secs(5) };
    GoogleSheetsSource::new(SourceCredential::new("tok-123"), config).unwrap()
}

#[test]
fn pages_through_windows_until_empty() {
    let (base, seen) = serve(vec![(200, r#"{"values":[["Nombre","Servicio"],["Ana García","Mensual"]]}"#.to_string()),
                                  (200, r#"{"values":[["Luis Pérez","Anual"]]}"#.to_string()),
                                  (200, r#"{"range":"Hoja 1!A5:B6"}"#.to_string()),
                                  (200, r#"{"range":"Hoja 1!A5:B1000"}"#.to_string())]);
    let schema = SheetSchema::new(["Nombre"], ["Servicio"]).unwrap();
    let reader = SheetReader::new(source(base, 2), schema);
    let sref = SourceRef::new("sheet-1", "Hoja 1!A:B");

    let rows: Vec<_> = reader.fetch_all(&sref).collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].row_index, 2);
    assert_eq!(rows[1].row_index, 3);
    assert_eq!(rows[1].get("Nombre"), Some("Luis Pérez"));

    let first = seen.recv().unwrap();
    assert!(first.request_line.starts_with("GET /v4/spreadsheets/sheet-1/values/Hoja%201!A1:B2?"),
            "{}",
            first.request_line);
    assert_eq!(first.authorization.as_deref(), Some("Bearer tok-123"));
    assert!(seen.recv().unwrap().request_line.contains("A3:B4"));
    assert!(seen.recv().unwrap().request_line.contains("A5:B6"));
    let tail = seen.recv().unwrap().request_line;
    assert!(tail.contains("A5:B?"), "{tail}");
}

#[test]
fn blank_block_mid_sheet_does_not_hide_later_rows() {
    let (base, seen) = serve(vec![(200, r#"{"values":[["Nombre","Servicio"],["Ana García","Mensual"]]}"#.to_string()),
                                  (200, r#"{"range":"Hoja 1!A3:B4"}"#.to_string()),
                                  (200, r#"{"range":"Hoja 1!A3:B1000","values":[[],[],["Luis Pérez","Anual"]]}"#.to_string())]);
    let schema = SheetSchema::new(["Nombre"], ["Servicio"]).unwrap();
    let reader = SheetReader::new(source(base, 2), schema);
    let sref = SourceRef::new("sheet-1", "Hoja 1!A:B");

    let rows: Vec<_> = reader.fetch_all(&sref).collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("Nombre"), Some("Luis Pérez"));
    assert_eq!(rows[1].row_index, 5);

    let requests: Vec<String> = seen.try_iter().map(|s| s.request_line).collect();
    assert_eq!(requests.len(), 3, "{requests:?}");
    assert!(requests[2].contains("A3:B?"), "{}", requests[2]);
}

#[test]
fn http_errors_are_classified() {
    let (base, _seen) = serve(vec![(503, r#"{"error":{"message":"backend"}}"#.to_string()),
                                   (403, r#"{"error":{"message":"The caller does not have permission"}}"#.to_string())]);
    let src = source(base, 500);
    let sref = SourceRef::new("sheet-1", "Hoja 1!A:G");

    assert!(matches!(src.fetch_page(&sref, None), Err(SourceError::Transient(_))));
    match src.fetch_page(&sref, Some(&PageCursor("501".into()))) {
        Err(SourceError::Permanent(msg)) => {
            assert!(msg.contains("403"));
            assert!(!msg.contains("tok-123"));
        }
        other => panic!("expected permanent error, got {other:?}"),
    }
}

#[test]
fn reader_retries_transient_http_errors() {
    let (base, _seen) = serve(vec![(429, "{}".to_string()),
                                   (200, r#"{"values":[["Nombre"],["Ana"]]}"#.to_string()),
                                   (200, "{}".to_string()),
                                   (200, "{}".to_string())]);
    let schema = SheetSchema::new(["Nombre"], Vec::<String>::new()).unwrap();
    let reader = SheetReader::new(source(base, 10), schema).with_retry(RetryPolicy::new(2, Duration::ZERO, Duration::ZERO));
    let sref = SourceRef::new("sheet-1", "A:A");

    let rows: Vec<_> = reader.fetch_all(&sref).collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(rows.len(), 1);
}
