//! ballers-sync
//!
//! Fachada del pipeline de sincronización hoja de cálculo → base relacional:
//! - `config`: configuración desde `.env` / entorno (`SyncConfig`).
//! - `errors`: errores de configuración y de aplicación.
//! - `bootstrap`: armado Google Sheets → Postgres listo para usar.
//!
//! Los crates de `crates/` se re-exportan para que los clientes dependan
//! sólo de éste.

pub mod bootstrap;
pub mod config;
pub mod errors;

pub use ballers_adapters;
pub use ballers_core;
pub use ballers_domain;
pub use ballers_persistence;

pub use bootstrap::{bootstrap, App, SheetsAutoSync, SheetsOrchestrator};
pub use config::{ConfigSummary, SyncConfig};
pub use errors::{AppError, ConfigError};
