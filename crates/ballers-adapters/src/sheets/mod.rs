//! `PageSource` sobre la API de Google Sheets v4.
//!
//! Paginación: un rango de columnas completas se lee en ventanas de
//! `page_size` filas; el cursor es la fila inicial de la siguiente ventana.
//! La API recorta las filas vacías al final de cada ventana; aquí se
//! rellenan para que la numeración de filas del lector siga siendo la de la
//! hoja. Ante una ventana vacía se pide el resto de la hoja (rango abierto)
//! en una sola petición: si también está vacío la lectura termina, y si no,
//! es la última página. Un bloque de filas en blanco a mitad de hoja no corta
//! los datos que siguen.
//!
//! Clasificación de errores:
//! - 408, 429, 5xx, timeouts y fallos de conexión → `SourceError::Transient`.
//! - Cualquier otro estado no exitoso (400, 401, 403, 404...) o un cuerpo
//!   ilegible → `SourceError::Permanent`.
//!
//! El token nunca aparece en logs ni en mensajes de error.

mod range;

use std::fmt;
use std::time::Duration;

use ballers_core::constants::DEFAULT_PAGE_SIZE;
use ballers_core::{Page, PageCursor, PageSource, SourceCredential, SourceError, SourceRef};
use log::debug;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

pub use range::RangeWindow;

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsClientConfig {
    pub base_url: String,
    pub page_size: usize,
    pub timeout: Duration,
}

impl Default for SheetsClientConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_SHEETS_BASE_URL.to_string(), page_size: DEFAULT_PAGE_SIZE, timeout: Duration::from_secs(30) }
    }
}

pub struct GoogleSheetsSource {
    client: Client,
    credential: SourceCredential,
    config: SheetsClientConfig,
}

impl fmt::Debug for GoogleSheetsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleSheetsSource")
         .field("base_url", &self.config.base_url)
         .field("page_size", &self.config.page_size)
         .field("credential", &self.credential)
         .finish()
    }
}

impl GoogleSheetsSource {
    pub fn new(credential: SourceCredential, config: SheetsClientConfig) -> Result<Self, SourceError> {
        if config.page_size == 0 {
            return Err(SourceError::Permanent("page_size must be at least 1".into()));
        }
        let client = Client::builder().timeout(config.timeout)
                                      .build()
                                      .map_err(|e| SourceError::Permanent(format!("http client: {e}")))?;
        Ok(Self { client, credential, config })
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| SourceError::Permanent(format!("invalid base url {:?}: {e}", self.config.base_url)))?;
        url.path_segments_mut()
           .map_err(|_| SourceError::Permanent(format!("base url cannot have a path: {}", self.config.base_url)))?
           .pop_if_empty()
           .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
        url.query_pairs_mut()
           .append_pair("majorDimension", "ROWS")
           .append_pair("valueRenderOption", "FORMATTED_VALUE");
        Ok(url)
    }
}

impl GoogleSheetsSource {
    fn get_values(&self, source: &SourceRef, range: &str) -> Result<Vec<Vec<String>>, SourceError> {
        let url = self.values_url(&source.spreadsheet_id, range)?;
        debug!("sheets:get source={source} range={range}");

        let response = self.client
                           .get(url)
                           .bearer_auth(self.credential.expose())
                           .send()
                           .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().map_err(transport_error)?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }
        let rows = parse_values(&body)?;
        debug!("sheets:got source={source} range={range} rows={}", rows.len());
        Ok(rows)
    }
}

impl PageSource for GoogleSheetsSource {
    fn fetch_page(&self, source: &SourceRef, cursor: Option<&PageCursor>) -> Result<Page, SourceError> {
        let start_row = match cursor {
            None => 1,
            Some(c) => c.0.parse::<usize>().map_err(|_| SourceError::Permanent(format!("invalid cursor {:?}", c.0)))?,
        };
        let Some(window) = RangeWindow::parse(&source.range) else {
            return Ok(Page { rows: self.get_values(source, &source.range)?, next: None });
        };
        let rows = self.get_values(source, &window.rows(start_row, self.config.page_size))?;
        if !rows.is_empty() {
            return Ok(windowed_page(rows, start_row, self.config.page_size));
        }
        // Ventana en blanco: el resto de la hoja decide si hay más datos.
        let tail = self.get_values(source, &window.tail(start_row))?;
        Ok(Page { rows: tail, next: None })
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Filas de un cuerpo `ValueRange`. Las celdas no textuales se convierten a
/// texto; `null` es celda vacía.
pub(crate) fn parse_values(body: &str) -> Result<Vec<Vec<String>>, SourceError> {
    let parsed: ValueRange =
        serde_json::from_str(body).map_err(|e| SourceError::Permanent(format!("unreadable values response: {e}")))?;
    Ok(parsed.values
             .into_iter()
             .map(|row| row.into_iter().map(cell_text).collect())
             .collect())
}

fn cell_text(cell: Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Página de una ventana con datos, rellenada hasta `page_size` filas.
pub(crate) fn windowed_page(mut rows: Vec<Vec<String>>, start_row: usize, page_size: usize) -> Page {
    rows.resize_with(rows.len().max(page_size), Vec::new);
    Page { rows, next: Some(PageCursor((start_row + page_size).to_string())) }
}

pub(crate) fn classify_status(status: u16, body: &str) -> SourceError {
    let message = serde_json::from_str::<Value>(body).ok()
                                                     .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
                                                     .unwrap_or_else(|| body.chars().take(200).collect());
    match status {
        408 | 429 | 500..=599 => SourceError::Transient(format!("HTTP {status}: {message}")),
        _ => SourceError::Permanent(format!("HTTP {status}: {message}")),
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_decode() || e.is_builder() {
        SourceError::Permanent(format!("request: {e}"))
    } else {
        SourceError::Transient(format!("request: {e}"))
    }
}
