//! ballers-adapters: implementaciones concretas de `PageSource`.
//!
//! - `sheets`: API de Google Sheets v4 (`spreadsheets.values.get`).

pub mod sheets;

pub use sheets::{GoogleSheetsSource, RangeWindow, SheetsClientConfig, DEFAULT_SHEETS_BASE_URL};
